//! STOMP heart-beat header parsing and negotiation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::HEARTBEAT_TOLERANCE;
use crate::error::FrameError;

/// Value of a `heart-beat` header: `<outgoing>,<incoming>` in milliseconds.
///
/// Zero means "cannot send" (outgoing) or "does not want to receive"
/// (incoming).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub outgoing: Duration,
    pub incoming: Duration,
}

impl HeartBeat {
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    /// Combines the client's offer with the server's reply.
    ///
    /// Each direction is enabled only when both sides agree, at the larger
    /// of the two requested periods.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> NegotiatedHeartBeat {
        let send_every = if client.outgoing.is_zero() || server.incoming.is_zero() {
            None
        } else {
            Some(client.outgoing.max(server.incoming))
        };
        let expect_every = if client.incoming.is_zero() || server.outgoing.is_zero() {
            None
        } else {
            Some(client.incoming.max(server.outgoing))
        };
        NegotiatedHeartBeat {
            send_every,
            expect_every,
        }
    }
}

impl FromStr for HeartBeat {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (out, inc) = s
            .split_once(',')
            .ok_or_else(|| FrameError::InvalidHeartBeat(s.to_string()))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| FrameError::InvalidHeartBeat(s.to_string()))
        };
        Ok(Self {
            outgoing: parse(out)?,
            incoming: parse(inc)?,
        })
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.outgoing.as_millis(),
            self.incoming.as_millis()
        )
    }
}

/// Heart-beat schedule in effect for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedHeartBeat {
    /// How often the client must send something.
    pub send_every: Option<Duration>,
    /// How often the server promised to send something.
    pub expect_every: Option<Duration>,
}

impl NegotiatedHeartBeat {
    /// Silence after which the link is considered dead.
    pub fn read_deadline(&self) -> Option<Duration> {
        self.expect_every.map(|d| d * HEARTBEAT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn parse_and_format() {
        let hb: HeartBeat = "4000,10000".parse().unwrap();
        assert_eq!(hb, HeartBeat::new(ms(4000), ms(10000)));
        assert_eq!(hb.to_string(), "4000,10000");

        let hb: HeartBeat = " 0 , 0 ".parse().unwrap();
        assert_eq!(hb, HeartBeat::default());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("4000".parse::<HeartBeat>().is_err());
        assert!("a,b".parse::<HeartBeat>().is_err());
        assert!("-1,0".parse::<HeartBeat>().is_err());
    }

    #[test]
    fn negotiate_takes_max_of_both_sides() {
        let client = HeartBeat::new(ms(4000), ms(4000));
        let server = HeartBeat::new(ms(10000), ms(2000));
        let n = HeartBeat::negotiate(client, server);
        assert_eq!(n.send_every, Some(ms(4000)));
        assert_eq!(n.expect_every, Some(ms(10000)));
        assert_eq!(n.read_deadline(), Some(ms(20000)));
    }

    #[test]
    fn negotiate_disables_when_either_side_is_zero() {
        let client = HeartBeat::new(ms(4000), ms(4000));
        let n = HeartBeat::negotiate(client, HeartBeat::default());
        assert_eq!(n.send_every, None);
        assert_eq!(n.expect_every, None);
        assert_eq!(n.read_deadline(), None);

        let client = HeartBeat::new(Duration::ZERO, ms(4000));
        let server = HeartBeat::new(ms(1000), ms(1000));
        let n = HeartBeat::negotiate(client, server);
        assert_eq!(n.send_every, None);
        assert_eq!(n.expect_every, Some(ms(4000)));
    }
}

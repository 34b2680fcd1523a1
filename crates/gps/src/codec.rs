use bytes::{Buf, BytesMut};
use chrono::NaiveTime;
use fm_types::{Coords2D, PositionFix};
use tokio_util::codec::Decoder;
use tracing::*;

use crate::nmea::{self, Sentence};

/// Longest sentence we will buffer. NMEA caps sentences at 82 characters, so
/// anything longer is line noise.
pub const LINE_CAPACITY: usize = 128;

/// Turns a raw byte stream from a GPS receiver into [`PositionFix`]es.
///
/// GGA and RMC sentences are merged into one running fix, and a fix is only
/// emitted when a sentence carries a timestamp that differs from the last one
/// seen, so a receiver that sends several sentences per update cycle yields a
/// single fix per cycle.
#[derive(Debug)]
pub struct NmeaCodec {
    line: Vec<u8>,
    fix: PartialFix,
    last_time: Option<NaiveTime>,
}

#[derive(Debug, Default, Clone, Copy)]
struct PartialFix {
    quality: u8,
    position: Coords2D,
    altitude: f32,
    satellites: u8,
    hdop: f32,
    speed: f32,
    heading: f32,
}

impl NmeaCodec {
    pub fn new() -> Self {
        NmeaCodec {
            line: Vec::with_capacity(LINE_CAPACITY),
            fix: PartialFix::default(),
            last_time: None,
        }
    }

    /// Feeds one byte. Returns a fix when the byte completes a sentence that
    /// advances the fix timestamp.
    pub fn push_byte(&mut self, byte: u8) -> Option<PositionFix> {
        match byte {
            b'$' => {
                if !self.line.is_empty() {
                    trace!("resynchronising on '$', dropping {} bytes", self.line.len());
                }
                self.line.clear();
                self.line.push(byte);
                None
            }
            b'\r' => None,
            b'\n' => {
                let fix = match std::str::from_utf8(&self.line) {
                    Ok(sentence) => match nmea::parse(sentence) {
                        Some(sentence) => self.merge(sentence),
                        None => {
                            trace!("discarding sentence {:?}", sentence);
                            None
                        }
                    },
                    Err(_) => None,
                };

                self.line.clear();
                fix
            }
            _ => {
                if self.line.len() >= LINE_CAPACITY - 1 {
                    trace!("line buffer full, discarding");
                    self.line.clear();
                }
                self.line.push(byte);
                None
            }
        }
    }

    fn merge(&mut self, sentence: Sentence) -> Option<PositionFix> {
        let time = sentence.time();

        match sentence {
            Sentence::Gga(gga) => {
                self.fix.position = gga.position;
                self.fix.quality = gga.quality;
                self.fix.satellites = gga.satellites;
                self.fix.hdop = gga.hdop;
                self.fix.altitude = gga.altitude;
            }
            Sentence::Rmc(rmc) => {
                self.fix.position = rmc.position;
                self.fix.speed = rmc.speed;
                self.fix.heading = rmc.heading;
            }
        }

        // sentences without a usable time are folded in but never emitted
        let time = time?;
        if self.last_time == Some(time) {
            return None;
        }
        self.last_time = Some(time);

        let PartialFix {
            quality,
            position,
            altitude,
            satellites,
            hdop,
            speed,
            heading,
        } = self.fix;

        Some(PositionFix {
            quality,
            time,
            position,
            altitude,
            satellites,
            hdop,
            speed,
            heading,
        })
    }
}

impl Default for NmeaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NmeaCodec {
    type Item = PositionFix;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            if let Some(fix) = self.push_byte(src.get_u8()) {
                return Ok(Some(fix));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn frame(body: &str) -> String {
        format!("${}*{:02X}\r\n", body, nmea::checksum(body.as_bytes()))
    }

    fn gga(time: &str, quality: u8, sats: u8) -> String {
        frame(&format!(
            "GPGGA,{time},5321.6802,N,00630.3372,W,{quality},{sats:02},1.03,61.7,M,55.2,M,,"
        ))
    }

    fn rmc(time: &str) -> String {
        frame(&format!(
            "GPRMC,{time},A,5321.6802,N,00630.3372,W,002.5,271.0,230394,003.1,W,A"
        ))
    }

    fn feed(codec: &mut NmeaCodec, input: &str) -> Vec<PositionFix> {
        input.bytes().filter_map(|b| codec.push_byte(b)).collect()
    }

    #[test]
    fn one_fix_per_update_cycle() {
        let mut codec = NmeaCodec::new();

        let input = [
            gga("092750.000", 1, 8),
            rmc("092750.000"),
            gga("092751.000", 1, 9),
            rmc("092751.000"),
        ]
        .concat();

        let fixes = feed(&mut codec, &input);

        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].time, NaiveTime::from_hms_opt(9, 27, 50).unwrap());
        assert_eq!(fixes[0].satellites, 8);
        assert_eq!(fixes[1].satellites, 9);
        // speed from the first cycle's RMC is carried into the second fix
        assert!((fixes[1].speed - 2.5).abs() < 1e-6);
        assert!((fixes[0].position.latitude - 53.36134).abs() < 1e-4);
        assert!((fixes[0].position.longitude + 6.50562).abs() < 1e-4);
    }

    #[test]
    fn sentences_without_time_are_not_emitted() {
        let mut codec = NmeaCodec::new();

        assert!(feed(&mut codec, &gga("", 1, 8)).is_empty());
        assert_eq!(feed(&mut codec, &gga("092750", 1, 8)).len(), 1);
        assert!(feed(&mut codec, &gga("", 1, 8)).is_empty());
    }

    #[test]
    fn bad_checksum_is_dropped() {
        let mut codec = NmeaCodec::new();
        let corrupted = gga("092750.000", 1, 8).replace("5321", "5322");

        assert!(feed(&mut codec, &corrupted).is_empty());
    }

    #[test]
    fn dollar_resynchronises() {
        let mut codec = NmeaCodec::new();
        let input = format!("$GPGGA,0927garbage{}", gga("092750.000", 1, 8));

        assert_eq!(feed(&mut codec, &input).len(), 1);
    }

    #[test]
    fn overlong_lines_are_discarded() {
        let mut codec = NmeaCodec::new();
        let noise = "$".to_owned() + &"A".repeat(400) + "\r\n";

        assert!(feed(&mut codec, &noise).is_empty());
        assert_eq!(feed(&mut codec, &gga("092750.000", 1, 8)).len(), 1);
    }

    #[test]
    fn field_injection_does_not_crash() {
        let mut codec = NmeaCodec::new();
        let input = frame("GPGGA,092750.000,5321.6802,N,00630.3372,W,1,08,1.03,61.7,M,55.2,M,,,")
            + &frame("GPRMC,092750.000,A,5321.6802,N")
            + &frame("GPGGA,,,,,,,,,,,,,,");

        assert!(feed(&mut codec, &input).is_empty());
    }

    #[tokio::test]
    async fn decodes_from_a_byte_stream() {
        let input = [
            gga("120000.00", 0, 0),
            gga("120001.00", 1, 4),
            rmc("120001.00"),
            gga("120002.00", 2, 11),
        ]
        .concat();

        let fixes: Vec<_> = FramedRead::new(input.as_bytes(), NmeaCodec::new())
            .map(|fix| fix.expect("decoding never fails"))
            .collect()
            .await;

        assert_eq!(
            fixes.iter().map(|f| f.quality).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(!fixes[0].is_usable(3));
        assert!(fixes[1].is_usable(4));
        assert!(!fixes[1].is_usable(5));
    }
}

//! Unit conversions from raw sample arguments to report values.

use crate::session::Sample;

/// Named conversion applied to `(arg0, arg1)`. Absent arguments mean the
/// field ran out of samples before the report did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// arg0 as is.
    Identity,
    /// 24-bit tick counter split over arg0 and arg1, in thousands.
    TicksCombined,
    /// arg0 as signed 16-bit, tenths.
    HeadPosition,
    /// Tenths.
    EdgeSize,
    /// Hundredths.
    CaretId,
    /// Hundredths.
    WireId,
    /// Offset by one for the vertical auto mode chart.
    AutoVertical,
    /// Offset by three for the horizontal auto mode chart.
    AutoHorizontal,
    /// Offset by five for the pipe detection chart.
    PipeDetection,
}

impl Converter {
    pub fn apply(self, arg0: Option<f64>, arg1: Option<f64>) -> f64 {
        let Some(v) = arg0 else {
            return 0.0;
        };
        match self {
            Self::Identity => v,
            Self::TicksCombined => (v * 256.0 + arg1.unwrap_or(0.0)) / 1000.0,
            Self::HeadPosition => f64::from(signed_16(v)) / 10.0,
            Self::EdgeSize => v / 10.0,
            Self::CaretId | Self::WireId => v / 100.0,
            Self::AutoVertical => v + 1.0,
            Self::AutoHorizontal => v + 3.0,
            Self::PipeDetection => v + 5.0,
        }
    }

    /// Convert a decoded sample, or the missing-sample default for `None`.
    pub fn sample(self, sample: Option<Sample>) -> f64 {
        match sample {
            Some(s) => self.apply(Some(f64::from(s.arg0)), Some(f64::from(s.arg1))),
            None => self.apply(None, None),
        }
    }
}

/// Reinterpret the low 16 bits of `v` as two's complement.
fn signed_16(v: f64) -> i32 {
    let raw = v as i32;
    if raw & 0x8000 != 0 {
        raw - 0x1_0000
    } else {
        raw
    }
}

/// Decimal parse tolerant of a comma decimal separator. Surrounding whitespace is ignored.
/// Infinities and NaN are not numbers here.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    text.parse::<f64>()
        .ok()
        .or_else(|| text.replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(arg0: u16, arg1: u8) -> Option<Sample> {
        Some(Sample { arg0, arg1 })
    }

    #[test]
    fn head_position_is_signed_tenths() {
        assert_eq!(Converter::HeadPosition.sample(s(0x8000, 0)), -3276.8);
        assert_eq!(Converter::HeadPosition.sample(s(100, 0)), 10.0);
        assert_eq!(Converter::HeadPosition.sample(s(0xFFFF, 0)), -0.1);
        assert_eq!(Converter::HeadPosition.sample(None), 0.0);
    }

    #[test]
    fn ticks_combine_both_args() {
        assert_eq!(Converter::TicksCombined.sample(s(1, 232)), 0.488);
        assert_eq!(Converter::TicksCombined.sample(s(1000, 0)), 256.0);
    }

    #[test]
    fn scaled_and_offset_conversions() {
        assert_eq!(Converter::Identity.sample(s(42, 7)), 42.0);
        assert_eq!(Converter::EdgeSize.sample(s(125, 0)), 12.5);
        assert_eq!(Converter::CaretId.sample(s(250, 0)), 2.5);
        assert_eq!(Converter::WireId.sample(s(120, 0)), 1.2);
        assert_eq!(Converter::AutoVertical.sample(s(0, 0)), 1.0);
        assert_eq!(Converter::AutoHorizontal.sample(s(1, 0)), 4.0);
        assert_eq!(Converter::PipeDetection.sample(s(1, 0)), 6.0);
    }

    #[test]
    fn missing_samples_default_to_zero() {
        let all = [
            Converter::Identity,
            Converter::TicksCombined,
            Converter::HeadPosition,
            Converter::EdgeSize,
            Converter::CaretId,
            Converter::WireId,
            Converter::AutoVertical,
            Converter::AutoHorizontal,
            Converter::PipeDetection,
        ];
        for c in all {
            assert_eq!(c.sample(None), 0.0, "{c:?}");
        }
    }

    #[test]
    fn decimal_accepts_comma() {
        assert_eq!(parse_decimal("1.5"), Some(1.5));
        assert_eq!(parse_decimal("1,5"), Some(1.5));
        assert_eq!(parse_decimal(" -2 "), Some(-2.0));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn decimal_rejects_non_finite() {
        for text in ["inf", "-Infinity", "NaN", "nan", "1e999"] {
            assert_eq!(parse_decimal(text), None, "{text}");
        }
    }
}

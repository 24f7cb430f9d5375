use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Timestamps are stored as UTC `timestamp` columns without offset.
pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    to_primitive_utc(OffsetDateTime::now_utc())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    let utc = value.assume_utc();
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
}

pub(crate) fn format_optional(value: Option<PrimitiveDateTime>) -> Option<String> {
    value.map(format_primitive)
}

/// Whole seconds from `start` to `end`, clamped at zero and to `i32`.
pub(crate) fn elapsed_seconds(start: OffsetDateTime, end: OffsetDateTime) -> i32 {
    let seconds = (end - start).whole_seconds().max(0);
    i32::try_from(seconds).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(datetime!(2025-01-02 10:20:30)), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn to_primitive_utc_normalises_offset() {
        let shifted = datetime!(2025-01-02 13:20:30 +03:00);
        assert_eq!(to_primitive_utc(shifted), datetime!(2025-01-02 10:20:30));
    }

    #[test]
    fn elapsed_seconds_never_negative() {
        let start = datetime!(2025-01-02 10:00:00 UTC);
        let end = datetime!(2025-01-02 10:12:30 UTC);
        assert_eq!(elapsed_seconds(start, end), 750);
        assert_eq!(elapsed_seconds(end, start), 0);
    }
}

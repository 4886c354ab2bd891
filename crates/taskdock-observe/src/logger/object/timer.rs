use std::fmt;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::logger::object::timezone::{LoggerTimeZone, offset_for};

/// RFC 3339 event timestamps in the configured timezone.
///
/// The local offset is read on every event, so a timezone sync shows up
/// without reinstalling the subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimer {
    tz: LoggerTimeZone,
}

impl LogTimer {
    pub fn new(tz: LoggerTimeZone) -> Self {
        Self { tz }
    }

    pub(crate) fn render(&self, at: OffsetDateTime) -> String {
        at.to_offset(offset_for(self.tz))
            .format(&Rfc3339)
            .unwrap_or_else(|_| "<invalid-time>".to_string())
    }
}

impl FormatTime for LogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{} ", self.render(OffsetDateTime::now_utc()))
    }
}

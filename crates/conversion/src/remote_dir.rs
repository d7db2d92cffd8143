use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::ConversionError;

/// Parent of the per-run directories on the conversion server.
pub const DEFAULT_REMOTE_TMP: &str = "/tmp";

/// A fresh `<parent>/virt-p2v-YYYYMMDD-<token>` for today's UTC date.
///
/// The directory is left on the server after the run for debugging. The
/// name never needs shell quoting as long as `parent` does not.
pub fn remote_dir_name(parent: &str) -> Result<String, ConversionError> {
    remote_dir_name_for(parent, OffsetDateTime::now_utc().date(), &ssh::random_token())
}

pub(crate) fn remote_dir_name_for(
    parent: &str,
    date: Date,
    token: &str,
) -> Result<String, ConversionError> {
    let day = date.format(format_description!("[year][month][day]"))?;
    Ok(format!("{}/virt-p2v-{day}-{token}", parent.trim_end_matches('/')))
}

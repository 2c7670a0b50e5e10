use chrono::{Datelike, NaiveDate};

use crate::feed::MonthKey;

/// Plan the query keys for a window of `month_count` months, starting at
/// `start` and stepping one calendar month backward per key. January rolls
/// over to December of the previous year. A zero month count yields an
/// empty plan, which is a valid no-op, not an error.
pub fn plan(start: NaiveDate, month_count: u32) -> Vec<MonthKey> {
    let mut keys = Vec::with_capacity(month_count as usize);
    let mut year = start.year();
    let mut month = start.month();

    for _ in 0..month_count {
        keys.push(MonthKey { year, month });
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }

    keys
}

use chrono::{NaiveDate, Utc};

/// Produce the ordered sequence of calendar days an import run must query.
///
/// Both bounds given: every day from `start` to `end` inclusive. A start
/// after the end is a valid empty plan ("nothing to import"), not an error.
/// Only a start: that single day. Neither: today.
pub fn plan_days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<NaiveDate> {
    plan_days_from(start, end, Utc::now().date_naive())
}

pub fn plan_days_from(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    match (start, end) {
        (Some(start), Some(end)) => {
            let mut days = Vec::new();
            let mut day = start;
            while day <= end {
                days.push(day);
                day = match day.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
            days
        }
        (Some(start), None) => vec![start],
        // An end bound without a start has nothing to anchor to; treat it
        // the same as no bounds at all.
        (None, _) => vec![today],
    }
}

use chrono::{Local, NaiveDate, TimeZone};

use super::Message;

/// One contiguous run of messages sharing a calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup<M> {
    pub day: NaiveDate,
    pub messages: Vec<M>,
}

/// Groups messages by local calendar day. See [`group_by_date_in`].
pub fn group_by_date<M: Message + Clone>(messages: &[M]) -> Vec<DateGroup<M>> {
    group_by_date_in(messages, &Local)
}

/// Partitions `messages` into maximal contiguous same-day runs, preserving input order.
///
/// Grouping is a single pass: a day that shows up again after a different day starts a
/// new group instead of being merged into the earlier one.
pub fn group_by_date_in<M, Tz>(messages: &[M], timezone: &Tz) -> Vec<DateGroup<M>>
where
    M: Message + Clone,
    Tz: TimeZone,
{
    let mut groups: Vec<DateGroup<M>> = Vec::new();

    for message in messages {
        let day = message.timestamp().with_timezone(timezone).date_naive();
        match groups.last_mut() {
            Some(group) if group.day == day => group.messages.push(message.clone()),
            _ => groups.push(DateGroup {
                day,
                messages: vec![message.clone()],
            }),
        }
    }

    groups
}

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use threadline_storage::{
    DeliveryStatus, MessageRecord, ParticipantId, Snippet, ThreadId, ThreadRecord,
    project_snippet, project_status,
};

use super::simulation::participant_id_for;

/// Display name of the thread the local user writes to themselves.
pub const NOTE_TO_SELF_NAME: &str = "Note to Self";

struct Line {
    /// `None` for the local user.
    author: Option<&'static str>,
    text: &'static str,
    /// How long before the seed instant the message was sent.
    age_minutes: i64,
}

const fn mine(text: &'static str, age_minutes: i64) -> Line {
    Line {
        author: None,
        text,
        age_minutes,
    }
}

const fn theirs(author: &'static str, text: &'static str, age_minutes: i64) -> Line {
    Line {
        author: Some(author),
        text,
        age_minutes,
    }
}

const DAY: i64 = 24 * 60;

/// Builds the demo thread list with short histories, oldest message first per thread.
///
/// Sort keys are allocated in ascending timestamp order across the whole seed.
pub fn demo_threads<R: Rng>(
    rng: &mut R,
    now: DateTime<Utc>,
    self_id: &ParticipantId,
) -> Vec<(ThreadRecord, Vec<MessageRecord>)> {
    let mut note = ThreadRecord::note_to_self(ThreadId::from("note-to-self"), NOTE_TO_SELF_NAME);
    note.is_pinned = true;

    let mut design = ThreadRecord::group(
        ThreadId::from("design-crew"),
        "Design Crew",
        vec![
            "Ada Lovelace".to_string(),
            "Grace Hopper".to_string(),
            "Linus Pauling".to_string(),
        ],
    );
    design.is_pinned = true;

    let mut family = ThreadRecord::group(
        ThreadId::from("family"),
        "Family",
        vec!["Mom".to_string(), "Sam".to_string()],
    );
    family.is_muted = true;

    let mut blocked = ThreadRecord::direct(ThreadId::from("unknown-caller"), "+1 555 0100");
    blocked.is_blocked = true;

    let mut request = ThreadRecord::direct(ThreadId::from("jordan"), "Jordan Lee");
    request.has_pending_request = true;

    let drafted = ThreadRecord::direct(ThreadId::from("priya"), "Priya Shah");

    let scripts: Vec<(ThreadRecord, Vec<Line>)> = vec![
        (
            note,
            vec![
                mine("Groceries: oat milk, lemons, basil", 3 * DAY),
                mine("Passport renewal form is in the top drawer", 90),
            ],
        ),
        (
            ThreadRecord::direct(ThreadId::from("kim"), "Kim Nguyen"),
            vec![
                theirs("Kim Nguyen", "Are you around this weekend?", 2 * DAY + 30),
                mine("Saturday works!", 2 * DAY + 12),
                theirs("Kim Nguyen", "Perfect, brunch at 11?", DAY + 40),
                mine("See you there", 25),
            ],
        ),
        (
            design,
            vec![
                theirs("Ada Lovelace", "New mockups are up", DAY + 300),
                theirs("Grace Hopper", "Love the color palette", DAY + 240),
                mine("Agreed, ship it", DAY + 200),
                theirs("Linus Pauling", "Review at 3pm today", 45),
            ],
        ),
        (
            family,
            vec![
                theirs("Mom", "Dinner on Sunday?", 4 * DAY),
                theirs("Sam", "I'm in", 4 * DAY - 10),
                mine("Count me in too", 3 * DAY + 600),
            ],
        ),
        (
            ThreadRecord::direct(ThreadId::from("alex"), "Alex Rivera"),
            vec![
                mine("Did the package arrive?", 200),
                theirs("Alex Rivera", "Yes, thank you!", 180),
            ],
        ),
        (
            blocked,
            vec![theirs("+1 555 0100", "You have won a prize", 5 * DAY)],
        ),
        (
            request,
            vec![theirs("Jordan Lee", "Hi! We met at the conference", 8 * 60)],
        ),
        (
            drafted,
            vec![theirs("Priya Shah", "Can you review my PR?", 6 * 60)],
        ),
    ];

    let mut stamped = Vec::new();
    for (thread_index, (_, lines)) in scripts.iter().enumerate() {
        for (line_index, line) in lines.iter().enumerate() {
            stamped.push((now - TimeDelta::minutes(line.age_minutes), thread_index, line_index));
        }
    }
    stamped.sort();

    let mut histories: Vec<Vec<MessageRecord>> = scripts.iter().map(|_| Vec::new()).collect();
    for (sort_key, (timestamp, thread_index, line_index)) in (1_u64..).zip(stamped) {
        let line = &scripts[thread_index].1[line_index];
        let message = match line.author {
            None => {
                // Older outgoing messages are read; the most recent may still be delivered.
                let status = if line.age_minutes > 60 || rng.gen_bool(0.5) {
                    DeliveryStatus::Read
                } else {
                    DeliveryStatus::Delivered
                };
                MessageRecord::outgoing(sort_key, timestamp, self_id.clone(), line.text)
                    .with_delivery_status(status)
            }
            Some(author) => MessageRecord::incoming(
                sort_key,
                timestamp,
                participant_id_for(author),
                Some(author.to_string()),
                line.text,
            ),
        };
        histories[thread_index].push(message);
    }

    scripts
        .into_iter()
        .zip(histories)
        .map(|((thread, _), messages)| (project_thread(rng, thread, &messages), messages))
        .collect()
}

fn project_thread<R: Rng>(
    rng: &mut R,
    mut thread: ThreadRecord,
    messages: &[MessageRecord],
) -> ThreadRecord {
    let Some(last) = messages.last() else {
        return thread;
    };

    thread.last_message_date = Some(last.timestamp);
    thread.last_message_snippet = Some(project_snippet(&thread, last));
    thread.last_message_status = project_status(last);

    if thread.id.as_str() == "priya" {
        thread.last_message_snippet = Some(Snippet::Draft {
            text: "Looking now, give me".to_string(),
        });
    }

    // Recent inbound tails are left unread; a few carry an unknown count.
    let recent_inbound = !last.is_outgoing && !thread.is_note_to_self && !thread.is_blocked;
    if recent_inbound {
        thread.has_unread_messages = true;
        thread.unread_count = if rng.gen_bool(0.25) {
            0
        } else {
            rng.gen_range(1..=3)
        };
    }

    thread
}

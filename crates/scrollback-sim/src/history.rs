//! Seeded message histories and the mutations applied to them between
//! reconciliation steps.

use std::collections::BTreeSet;
use std::fmt;

use scrollback_core::model::{
    BackgroundData, Message, MessageId, Narrow, Recipient, StreamId, StreamInfo, UserId,
};
use serde::{Deserialize, Serialize};

use crate::rng::SimRng;

const START: i64 = 1_700_000_000;
const USERS: [u64; 4] = [1, 2, 3, 4];
const TOPICS: [&str; 4] = ["design", "Design", "release", "lunch"];
const COLORS: [&str; 3] = ["#76ce90", "#f5ce6e", "#a6c7e5"];

/// One change to the world between two reconciliation steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Mutation {
    /// New message after every existing one.
    Append {
        id: MessageId,
        sender: UserId,
        recipient: Recipient,
        delay: i64,
    },
    /// Older message showing up in an id gap, e.g. after fetching history.
    Backfill {
        id: MessageId,
        sender: UserId,
        after: MessageId,
    },
    Edit {
        id: MessageId,
    },
    Delete {
        id: MessageId,
    },
    MoveTopic {
        id: MessageId,
        topic: String,
    },
    RenameSender {
        user: UserId,
        name: String,
    },
    SwitchNarrow {
        narrow: Narrow,
    },
    ChangeBackground {
        change: BackgroundChange,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "kebab-case")]
pub enum BackgroundChange {
    ToggleTimeFormat,
    /// Never affects rendering.
    BumpFeatureLevel,
    RecolorStream { stream_id: StreamId, color: String },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append { id, sender, .. } => write!(f, "append {id} from {sender}"),
            Self::Backfill { id, after, .. } => write!(f, "backfill {id} after {after}"),
            Self::Edit { id } => write!(f, "edit {id}"),
            Self::Delete { id } => write!(f, "delete {id}"),
            Self::MoveTopic { id, topic } => write!(f, "move {id} to topic {topic:?}"),
            Self::RenameSender { user, name } => write!(f, "rename {user} to {name:?}"),
            Self::SwitchNarrow { narrow } => write!(f, "narrow to {narrow}"),
            Self::ChangeBackground { change } => write!(f, "background: {change:?}"),
        }
    }
}

/// Knobs for how often the rarer mutations happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationMix {
    pub narrow_switch_percent: u8,
    pub background_change_percent: u8,
}

impl Default for MutationMix {
    fn default() -> Self {
        Self {
            narrow_switch_percent: 5,
            background_change_percent: 5,
        }
    }
}

/// Messages plus the view they are rendered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    pub messages: Vec<Message>,
    pub narrow: Narrow,
    pub background: BackgroundData,
    next_id: u64,
    clock: i64,
}

impl World {
    /// A world with `initial` messages generated from `rng`.
    pub fn seeded(rng: &mut SimRng, initial: usize) -> Self {
        let mut background = BackgroundData {
            own_user_id: UserId(1),
            ..BackgroundData::default()
        };
        for id in USERS {
            background.users.insert(UserId(id), format!("User {id}"));
        }
        for id in 1..=2 {
            background.streams.insert(
                StreamId(id),
                StreamInfo {
                    name: format!("stream-{id}"),
                    color: COLORS[0].to_string(),
                },
            );
        }

        let mut world = Self {
            messages: Vec::with_capacity(initial),
            narrow: Narrow::All,
            background,
            next_id: 0,
            clock: START,
        };
        for _ in 0..initial {
            let append = world.random_append(rng);
            world.apply(&append);
        }
        world
    }

    /// Draw the next mutation. Mutations that need an existing message fall
    /// back to an append when the world is empty.
    pub fn random_mutation(&self, rng: &mut SimRng, mix: MutationMix) -> Mutation {
        if rng.hit_rate_percent(mix.narrow_switch_percent) {
            return Mutation::SwitchNarrow {
                narrow: random_narrow(rng),
            };
        }
        if rng.hit_rate_percent(mix.background_change_percent) {
            return Mutation::ChangeBackground {
                change: random_background_change(rng),
            };
        }

        let Some(target) = rng.pick(&self.messages) else {
            return self.random_append(rng);
        };
        let id = target.id;

        match rng.next_bounded(10) {
            0..=3 => self.random_append(rng),
            4 => self.random_backfill(rng).unwrap_or_else(|| self.random_append(rng)),
            5 | 6 => Mutation::Edit { id },
            7 => Mutation::Delete { id },
            8 => Mutation::MoveTopic {
                id,
                topic: pick_str(rng, &TOPICS),
            },
            _ => {
                let user = UserId(USERS[rng.index(USERS.len())]);
                Mutation::RenameSender {
                    user,
                    name: format!("User {} v{}", user, rng.next_bounded(100)),
                }
            }
        }
    }

    fn random_append(&self, rng: &mut SimRng) -> Mutation {
        // Gaps between ids leave room for backfills.
        let id = MessageId(self.next_id + 1 + rng.next_bounded(3));
        // Mostly quick replies; now and then the conversation crosses midnight.
        let delay = if rng.hit_rate_percent(8) {
            i64::try_from(30_000 + rng.next_bounded(90_000)).unwrap_or(30_000)
        } else {
            i64::try_from(rng.next_bounded(600)).unwrap_or(0)
        };
        // Stick with the previous recipient and sender often enough to form runs.
        let last = self.messages.last();
        let recipient = match last {
            Some(m) if rng.hit_rate_percent(60) => m.recipient.clone(),
            _ => random_recipient(rng),
        };
        let sender = match last {
            Some(m) if rng.hit_rate_percent(50) => m.sender_id,
            _ => UserId(USERS[rng.index(USERS.len())]),
        };
        Mutation::Append {
            id,
            sender,
            recipient,
            delay,
        }
    }

    fn random_backfill(&self, rng: &mut SimRng) -> Option<Mutation> {
        let gaps: Vec<usize> = self
            .messages
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].id.0 + 1 < pair[1].id.0)
            .map(|(i, _)| i)
            .collect();
        let &i = rng.pick(&gaps)?;
        let after = self.messages[i].id;
        Some(Mutation::Backfill {
            id: MessageId(after.0 + 1),
            sender: UserId(USERS[rng.index(USERS.len())]),
            after,
        })
    }

    /// Apply `mutation`. Mutations naming a message that no longer exists are
    /// ignored.
    pub fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::Append {
                id,
                sender,
                recipient,
                delay,
            } => {
                self.clock += delay;
                self.next_id = id.0;
                let message = self.compose(*id, self.clock, *sender, recipient.clone());
                self.messages.push(message);
            }
            Mutation::Backfill { id, sender, after } => {
                let Some(pos) = self.position(*after) else {
                    return;
                };
                let prev = &self.messages[pos];
                let message = self.compose(*id, prev.timestamp, *sender, prev.recipient.clone());
                self.messages.insert(pos + 1, message);
            }
            Mutation::Edit { id } => {
                let clock = self.clock;
                if let Some(m) = self.find_mut(*id) {
                    m.content = format!("<p>edited {id} at {clock}</p>");
                    m.last_edit_timestamp = Some(clock);
                }
            }
            Mutation::Delete { id } => {
                self.messages.retain(|m| m.id != *id);
            }
            Mutation::MoveTopic { id, topic } => {
                if let Some(m) = self.find_mut(*id) {
                    if let Recipient::Stream { topic: current, .. } = &mut m.recipient {
                        current.clone_from(topic);
                    }
                }
            }
            Mutation::RenameSender { user, name } => {
                for m in self.messages.iter_mut().filter(|m| m.sender_id == *user) {
                    m.sender_full_name.clone_from(name);
                }
                self.background.users.insert(*user, name.clone());
            }
            Mutation::SwitchNarrow { narrow } => self.narrow = narrow.clone(),
            Mutation::ChangeBackground { change } => match change {
                BackgroundChange::ToggleTimeFormat => {
                    self.background.twenty_four_hour_time = !self.background.twenty_four_hour_time;
                }
                BackgroundChange::BumpFeatureLevel => self.background.feature_level += 1,
                BackgroundChange::RecolorStream { stream_id, color } => {
                    if let Some(info) = self.background.streams.get_mut(stream_id) {
                        info.color.clone_from(color);
                    }
                }
            },
        }
    }

    fn compose(&self, id: MessageId, timestamp: i64, sender: UserId, recipient: Recipient) -> Message {
        Message {
            id,
            timestamp,
            sender_id: sender,
            sender_full_name: self.background.user_name(sender),
            avatar_url: Some(format!("https://avatars.example/{sender}.png")),
            content: format!("<p>message {id}</p>"),
            recipient,
            last_edit_timestamp: None,
        }
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.binary_search_by_key(&id, |m| m.id).ok()
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let pos = self.position(id)?;
        self.messages.get_mut(pos)
    }
}

fn pick_str(rng: &mut SimRng, items: &[&str]) -> String {
    rng.pick(items).map_or_else(String::new, |s| (*s).to_string())
}

fn random_recipient(rng: &mut SimRng) -> Recipient {
    match rng.next_bounded(4) {
        0 | 1 => {
            let stream_id = StreamId(1 + rng.next_bounded(2));
            Recipient::Stream {
                stream_id,
                stream: format!("stream-{stream_id}"),
                topic: pick_str(rng, &TOPICS),
            }
        }
        2 => Recipient::Private {
            participants: BTreeSet::from([UserId(1), UserId(2)]),
        },
        _ => Recipient::Private {
            participants: BTreeSet::from([UserId(1), UserId(2), UserId(3)]),
        },
    }
}

fn random_narrow(rng: &mut SimRng) -> Narrow {
    match rng.next_bounded(6) {
        0 | 1 => Narrow::All,
        2 => Narrow::Stream {
            stream_id: StreamId(1),
        },
        3 => Narrow::Topic {
            stream_id: StreamId(1),
            topic: pick_str(rng, &TOPICS),
        },
        4 => Narrow::AllPrivate,
        _ => Narrow::Sender {
            user_id: UserId(USERS[rng.index(USERS.len())]),
        },
    }
}

fn random_background_change(rng: &mut SimRng) -> BackgroundChange {
    match rng.next_bounded(3) {
        0 => BackgroundChange::ToggleTimeFormat,
        1 => BackgroundChange::BumpFeatureLevel,
        _ => BackgroundChange::RecolorStream {
            stream_id: StreamId(1 + rng.next_bounded(2)),
            color: pick_str(rng, &COLORS),
        },
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A two-participant message thread. The pair is stored sorted
/// (`participant_one < participant_two`) so lookup by pair is idempotent,
/// and it is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_one: Uuid,
    pub participant_two: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_one == user_id || self.participant_two == user_id
    }

    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.participant_one == user_id {
            Some(self.participant_two)
        } else if self.participant_two == user_id {
            Some(self.participant_one)
        } else {
            None
        }
    }
}

/// Order a participant pair the way it is stored.
pub fn sort_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(a: Uuid, b: Uuid) -> Conversation {
        let (one, two) = sort_pair(a, b);
        Conversation {
            id: Uuid::new_v4(),
            participant_one: one,
            participant_two: two,
            last_message_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sort_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(sort_pair(a, b), sort_pair(b, a));
    }

    #[test]
    fn recognizes_both_participants() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = conversation(a, b);

        assert!(conv.has_participant(a));
        assert!(conv.has_participant(b));
        assert!(!conv.has_participant(Uuid::new_v4()));
    }

    #[test]
    fn other_participant_flips_the_pair() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = conversation(a, b);

        assert_eq!(conv.other_participant(a), Some(b));
        assert_eq!(conv.other_participant(b), Some(a));
        assert_eq!(conv.other_participant(Uuid::new_v4()), None);
    }
}

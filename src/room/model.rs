use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role of a participant within a room. Never stored: always derived
/// from the room's `mentor` field so it cannot desynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Student,
}

/// Persisted room document. This is the exact shape every store
/// backend round-trips: `{room, mentor, students, order}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room: String,
    pub mentor: Option<String>,
    /// user id -> that user's current code text
    pub students: HashMap<String, String>,
    /// join order of non-mentor participants; defines display numbers
    pub order: Vec<String>,
}

impl Room {
    /// Empty room synthesized on the first join to an unseen room id.
    pub fn empty(room_id: impl Into<String>) -> Self {
        Self {
            room: room_id.into(),
            mentor: None,
            students: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.students.contains_key(user_id)
    }

    /// Mentor iff the mentor slot names this user.
    pub fn role_of(&self, user_id: &str) -> Role {
        if self.mentor.as_deref() == Some(user_id) {
            Role::Mentor
        } else {
            Role::Student
        }
    }

    /// One-based display number of a Student, from join order.
    pub fn student_number(&self, user_id: &str) -> Option<usize> {
        self.order.iter().position(|id| id == user_id).map(|i| i + 1)
    }

    /// Display name used in room-wide broadcasts: "Mentor" or
    /// "Student {n}". Numbers are snapshots, not stable identifiers.
    pub fn display_name(&self, user_id: &str) -> String {
        match self.role_of(user_id) {
            Role::Mentor => "Mentor".to_string(),
            Role::Student => match self.student_number(user_id) {
                Some(n) => format!("Student {}", n),
                None => user_id.to_string(),
            },
        }
    }

    /// Adds a new participant with empty code. The first joiner while
    /// the mentor slot is unset claims it; everyone else is appended to
    /// `order`. A rejoining user whose id still occupies the mentor
    /// slot resumes as Mentor rather than entering `order` (the slot
    /// never appears in `order`). No-op when the user is already
    /// present.
    pub fn add_participant(&mut self, user_id: &str) {
        if self.is_participant(user_id) {
            return;
        }
        self.students.insert(user_id.to_string(), String::new());
        if self.mentor.is_none() {
            self.mentor = Some(user_id.to_string());
        } else if self.mentor.as_deref() != Some(user_id) {
            self.order.push(user_id.to_string());
        }
    }

    /// Removes a participant. Later Students' display numbers shift
    /// down by one. The mentor slot is intentionally left untouched
    /// even when the departing user is the mentor.
    pub fn remove_participant(&mut self, user_id: &str) -> bool {
        let was_present = self.students.remove(user_id).is_some();
        self.order.retain(|id| id != user_id);
        was_present
    }

    /// An empty room is equivalent to a non-existent one.
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// `(display name, code)` pairs for every ordered Student, in join
    /// order. This is the Mentor's private snapshot on join.
    pub fn student_snapshot(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                self.students
                    .get(id)
                    .map(|code| (format!("Student {}", i + 1), code.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_joiner_claims_mentor_slot() {
        let mut room = Room::empty("2");
        room.add_participant("alice");
        assert_eq!(room.mentor.as_deref(), Some("alice"));
        assert_eq!(room.role_of("alice"), Role::Mentor);
        assert!(room.order.is_empty());
    }

    #[test]
    fn test_subsequent_joiners_are_ordered_students() {
        let mut room = Room::empty("2");
        room.add_participant("alice");
        room.add_participant("bob");
        room.add_participant("carol");
        assert_eq!(room.order, vec!["bob", "carol"]);
        assert_eq!(room.student_number("bob"), Some(1));
        assert_eq!(room.student_number("carol"), Some(2));
        assert_eq!(room.display_name("carol"), "Student 2");
        assert_eq!(room.display_name("alice"), "Mentor");
    }

    #[test]
    fn test_rejoin_is_a_no_op() {
        let mut room = Room::empty("2");
        room.add_participant("alice");
        room.add_participant("bob");
        room.students.insert("bob".to_string(), "code".to_string());
        room.add_participant("bob");
        assert_eq!(room.order, vec!["bob"]);
        assert_eq!(room.students["bob"], "code");
    }

    #[test]
    fn test_remove_shifts_display_numbers_down() {
        let mut room = Room::empty("2");
        for id in ["m", "a", "b", "c"] {
            room.add_participant(id);
        }
        assert!(room.remove_participant("a"));
        assert_eq!(room.student_number("b"), Some(1));
        assert_eq!(room.student_number("c"), Some(2));
        assert!(!room.is_participant("a"));
    }

    #[test]
    fn test_remove_unknown_participant_returns_false() {
        let mut room = Room::empty("2");
        room.add_participant("m");
        assert!(!room.remove_participant("ghost"));
        assert!(room.is_participant("m"));
    }

    #[test]
    fn test_mentor_slot_survives_mentor_leaving() {
        let mut room = Room::empty("2");
        room.add_participant("m");
        room.add_participant("a");
        room.remove_participant("m");
        // Departed id is deliberately left in the slot; the next join
        // does not reclaim it until the slot is cleared out-of-band.
        assert_eq!(room.mentor.as_deref(), Some("m"));
        assert_eq!(room.role_of("a"), Role::Student);
    }

    #[test]
    fn test_stale_mentor_rejoining_resumes_mentor_role() {
        let mut room = Room::empty("2");
        room.add_participant("m");
        room.add_participant("a");
        room.remove_participant("m");

        room.add_participant("m");
        assert_eq!(room.role_of("m"), Role::Mentor);
        assert_eq!(room.order, vec!["a"]);
    }

    #[test]
    fn test_document_shape_round_trip() {
        let mut room = Room::empty("2");
        room.add_participant("m");
        room.add_participant("a");
        room.students.insert("a".to_string(), "return max".to_string());

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["room"], "2");
        assert_eq!(json["mentor"], "m");
        assert_eq!(json["order"][0], "a");
        assert_eq!(json["students"]["a"], "return max");

        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn test_student_snapshot_in_join_order() {
        let mut room = Room::empty("2");
        for id in ["m", "a", "b"] {
            room.add_participant(id);
        }
        room.students.insert("a".to_string(), "fn a() {}".to_string());
        room.students.insert("b".to_string(), "fn b() {}".to_string());
        assert_eq!(
            room.student_snapshot(),
            vec![
                ("Student 1".to_string(), "fn a() {}".to_string()),
                ("Student 2".to_string(), "fn b() {}".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_room_is_equivalent_to_absent() {
        let mut room = Room::empty("2");
        room.add_participant("m");
        room.remove_participant("m");
        assert!(room.is_empty());
    }
}

use serde::Serialize;

/// Token inside every skeleton marking where the student writes code.
/// Stripped before the skeleton is handed to an editor.
pub const CODE_PLACEHOLDER: &str = "// your solution here";

/// One catalog entry: an exercise id, a human title and the raw code
/// skeleton still containing the placeholder token.
#[derive(Debug, Clone)]
struct Exercise {
    id: &'static str,
    title: &'static str,
    skeleton: &'static str,
}

/// Listing entry returned by `GET /exercises`: `code` is the skeleton
/// with the placeholder already stripped.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExerciseListing {
    pub id: String,
    pub title: String,
    pub code: String,
}

/// Static mapping from exercise id to a code skeleton. Pure lookup,
/// no mutation; room ids double as exercise ids.
#[derive(Debug, Default)]
pub struct TemplateCatalog;

const EXERCISES: &[Exercise] = &[
    Exercise {
        id: "1",
        title: "Async Case",
        skeleton: "async function fetchData() {\n  // your solution here\n}\n",
    },
    Exercise {
        id: "2",
        title: "Array Manipulation",
        skeleton: "const arr = [1, 2, 3];\nfunction findMax(arr) {\n  // your solution here\n}\n",
    },
    Exercise {
        id: "3",
        title: "Event Handling",
        skeleton: "document.getElementById(\"btn\").addEventListener(\"click\", () => {\n  // your solution here\n});\n",
    },
    Exercise {
        id: "4",
        title: "Conditional Rendering",
        skeleton: "function render(isLoggedIn) {\n  if (isLoggedIn) {\n    // your solution here\n  }\n}\n",
    },
];

impl TemplateCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Seed code for a room: the exercise skeleton with the placeholder
    /// stripped. Unknown ids seed empty code instead of failing a join.
    pub fn seed_code(&self, exercise_id: &str) -> String {
        EXERCISES
            .iter()
            .find(|e| e.id == exercise_id)
            .map(|e| strip_placeholder(e.skeleton))
            .unwrap_or_default()
    }

    /// Every known exercise, for the listing endpoint.
    pub fn listing(&self) -> Vec<ExerciseListing> {
        EXERCISES
            .iter()
            .map(|e| ExerciseListing {
                id: e.id.to_string(),
                title: e.title.to_string(),
                code: strip_placeholder(e.skeleton),
            })
            .collect()
    }
}

/// Removes the placeholder token and any whitespace-only line it
/// leaves behind.
fn strip_placeholder(skeleton: &str) -> String {
    skeleton
        .lines()
        .filter(|line| !line.trim().eq(CODE_PLACEHOLDER))
        .map(|line| line.replace(CODE_PLACEHOLDER, ""))
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

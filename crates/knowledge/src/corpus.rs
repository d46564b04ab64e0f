//! Review corpus: the built-in reviews and file loading.

use crate::types::ReviewRecord;
use profrag_core::{AppError, AppResult};
use std::path::Path;

const BUILTIN_REVIEWS: &[(&str, &str, u8, &str)] = &[
    ("Dr. Jane Smith", "Mathematics", 5, "Dr. Smith is an amazing teacher! She explains complex concepts clearly and always makes time for students."),
    ("Dr. Robert Johnson", "Physics", 3, "Dr. Johnson knows his stuff, but his lectures are a bit dry. The material is tough but manageable."),
    ("Professor Emily Davis", "English Literature", 4, "Professor Davis is very passionate about literature, which makes her classes enjoyable. However, her grading is tough."),
    ("Dr. Michael Brown", "Chemistry", 2, "Dr. Brown's lectures are hard to follow, and he doesn't explain things well. Labs were more helpful than his lectures."),
    ("Professor Lisa Wilson", "History", 5, "Professor Wilson makes history come alive! Her classes are engaging, and she is always open to discussions."),
    ("Dr. John Miller", "Biology", 4, "Dr. Miller is knowledgeable and cares about students, but his exams are very challenging."),
    ("Professor Sarah Moore", "Psychology", 3, "Professor Moore's classes are interesting, but she tends to rush through the material."),
    ("Dr. William Taylor", "Computer Science", 5, "Dr. Taylor is a fantastic professor! His coding examples are practical, and he is always willing to help."),
    ("Professor Karen Anderson", "Philosophy", 4, "Professor Anderson encourages deep thinking and class discussions, though sometimes the topics can be confusing."),
    ("Dr. Richard Thomas", "Economics", 2, "Dr. Thomas's lectures are very theoretical and not very engaging. He could improve by connecting theory to real-world examples."),
    ("Professor Patricia Jackson", "Sociology", 4, "Professor Jackson is very knowledgeable and approachable. The class discussions are thought-provoking."),
    ("Dr. Steven White", "Political Science", 5, "Dr. White is an excellent lecturer with a deep understanding of political systems. His classes are a must-attend."),
    ("Professor Laura Harris", "Art History", 3, "Professor Harris is passionate about art, but her lectures can be a bit monotonous."),
    ("Dr. Daniel Martin", "Physics", 4, "Dr. Martin's classes are well-structured and informative. However, he expects a lot from students."),
    ("Professor Nancy Lee", "Statistics", 2, "Professor Lee's explanations are often unclear, making it hard to grasp the concepts. Tutorials helped more than lectures."),
    ("Dr. Charles King", "Philosophy", 5, "Dr. King is a brilliant thinker and challenges students to see things differently. His classes are both difficult and rewarding."),
    ("Professor Barbara Young", "Anthropology", 4, "Professor Young is very knowledgeable and her classes are interesting, but the reading load is heavy."),
    ("Dr. James Allen", "Chemistry", 3, "Dr. Allen's lectures are thorough, but sometimes he goes too fast. His office hours are helpful."),
    ("Professor Sandra Scott", "English", 5, "Professor Scott is one of the best English professors I've had. Her feedback on essays is incredibly detailed and helpful."),
    ("Dr. George Wright", "Mathematics", 1, "Dr. Wright's teaching style is very confusing, and he rarely answers questions clearly. Not a good experience."),
];

/// The built-in corpus, ids `review-1` to `review-20`.
pub fn builtin_reviews() -> Vec<ReviewRecord> {
    BUILTIN_REVIEWS
        .iter()
        .enumerate()
        .map(|(i, (professor, subject, rating, comment))| ReviewRecord {
            id: format!("review-{}", i + 1),
            professor: professor.to_string(),
            subject: subject.to_string(),
            star_rating: *rating,
            review_comment: comment.to_string(),
        })
        .collect()
}

/// Load reviews from a JSON or YAML file holding a list of records.
///
/// Records without an `id` get `review-<n>` by position.
pub fn load_reviews(path: &Path) -> AppResult<Vec<ReviewRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read reviews file {:?}: {}", path, e))
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let raw: Vec<serde_json::Value> = if is_json {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    let mut reviews = Vec::with_capacity(raw.len());
    for (i, mut value) in raw.into_iter().enumerate() {
        if let Some(object) = value.as_object_mut() {
            object
                .entry("id")
                .or_insert_with(|| serde_json::Value::String(format!("review-{}", i + 1)));
        }

        let review: ReviewRecord = serde_json::from_value(value).map_err(|e| {
            AppError::Knowledge(format!("Invalid review at position {}: {}", i + 1, e))
        })?;
        reviews.push(review);
    }

    tracing::debug!("Loaded {} reviews from {:?}", reviews.len(), path);
    Ok(reviews)
}

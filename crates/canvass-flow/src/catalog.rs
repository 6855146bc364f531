//! The ordered question catalog.

use crate::error::FlowError;
use canvass_types::Question;

/// Ordered list of survey questions, fixed at process start.
///
/// Sequence is vector order. Question ids are opaque labels carried along for
/// storage and webhook round-trips; the controller never derives ordering
/// from them.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    pub fn new(questions: Vec<Question>) -> Result<Self, FlowError> {
        if questions.is_empty() {
            return Err(FlowError::EmptyCatalog);
        }
        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at a catalog position, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// The first question, asked when a call connects.
    pub fn first(&self) -> &Question {
        &self.questions[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(matches!(
            QuestionCatalog::new(vec![]),
            Err(FlowError::EmptyCatalog)
        ));
    }

    #[test]
    fn order_is_vector_order_not_id_order() {
        // Deliberately shuffled labels: position wins over any numeric hint
        // in the id text.
        let catalog = QuestionCatalog::new(vec![
            Question::new("Q9", "first"),
            Question::new("Q1", "second"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.first().id.as_str(), "Q9");
        assert_eq!(catalog.get(1).unwrap().prompt, "second");
        assert!(catalog.get(2).is_none());
    }
}

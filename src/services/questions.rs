// src/services/questions.rs

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::question::{PublicQuestion, Question, QuestionFilter, QuestionInput, QuestionStatus},
    store::QuizStore,
};

/// Published questions only, without answer keys.
pub async fn list_published(
    store: &dyn QuizStore,
    mut filter: QuestionFilter,
) -> Result<Vec<PublicQuestion>, AppError> {
    filter.status = Some(QuestionStatus::Published);
    let questions = store.list_questions(&filter).await?;
    Ok(questions.iter().map(Question::to_public).collect())
}

pub async fn list_all(store: &dyn QuizStore, filter: QuestionFilter) -> Result<Vec<Question>, AppError> {
    Ok(store.list_questions(&filter).await?)
}

/// New questions always start as drafts.
pub async fn create(
    store: &dyn QuizStore,
    input: QuestionInput,
    now: DateTime<Utc>,
) -> Result<Question, AppError> {
    let question = store.insert_question(input.into_clean()?, now).await?;
    tracing::info!(question_id = question.id, category = %question.category, "Question drafted");
    Ok(question)
}

/// Edits content and bumps the version. The workflow status is unchanged.
pub async fn update(
    store: &dyn QuizStore,
    id: i64,
    input: QuestionInput,
    now: DateTime<Utc>,
) -> Result<Question, AppError> {
    let input = input.into_clean()?;
    let mut question = store
        .get_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    question.apply_edit(input, now);
    store.update_question(&question).await?;

    tracing::info!(
        question_id = id,
        version = question.version,
        status = question.status.as_str(),
        "Question edited"
    );
    Ok(question)
}

pub async fn change_status(
    store: &dyn QuizStore,
    id: i64,
    next: QuestionStatus,
    now: DateTime<Utc>,
) -> Result<Question, AppError> {
    let mut question = store
        .get_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let previous = question.status;
    question.transition(next, now)?;
    store.update_question(&question).await?;

    tracing::info!(
        question_id = id,
        from = previous.as_str(),
        to = next.as_str(),
        "Question status changed"
    );
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Difficulty;
    use crate::store::MemoryStore;

    fn input() -> QuestionInput {
        QuestionInput {
            prompt: "First-line therapy for absence seizures?".to_string(),
            options: vec!["Ethosuximide".to_string(), "Phenytoin".to_string()],
            correct_answer: 0,
            explanation: "Blocks T-type calcium channels.".to_string(),
            category: "neuro".to_string(),
            difficulty: Difficulty::Easy,
            tags: vec!["pharm".to_string()],
            reference_url: None,
        }
    }

    #[tokio::test]
    async fn drafts_are_hidden_until_published() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let q = create(&store, input(), now).await.unwrap();
        assert_eq!(q.status, QuestionStatus::Draft);
        assert_eq!(q.version, 1);
        assert!(list_published(&store, QuestionFilter::default()).await.unwrap().is_empty());

        change_status(&store, q.id, QuestionStatus::Review, now).await.unwrap();
        change_status(&store, q.id, QuestionStatus::Published, now).await.unwrap();
        assert_eq!(list_published(&store, QuestionFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skipping_review_is_rejected() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let q = create(&store, input(), now).await.unwrap();
        assert!(matches!(
            change_status(&store, q.id, QuestionStatus::Published, now).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn edits_bump_version() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let q = create(&store, input(), now).await.unwrap();
        let mut edit = input();
        edit.options.push("Valproate".to_string());
        let edited = update(&store, q.id, edit, now).await.unwrap();
        assert_eq!(edited.version, 2);
        assert_eq!(edited.options.len(), 3);

        assert!(matches!(
            update(&store, 999, input(), now).await,
            Err(AppError::NotFound(_))
        ));
    }
}

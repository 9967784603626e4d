//! Retrieval-augmented strategy library with reflective updates
//!
//! Strategies are short behavioral rules retrieved into planning prompts by
//! tag similarity. After each episode a reflection pass asks the model
//! whether to add, modify, or delete a rule; the suggestion arrives as JSON
//! and is merged under the library mutex. Reflection runs detached and must
//! never block the tick.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::model::LanguageModel;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use soma_core::types::CognitiveEvent;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// One behavioral rule. Ids are never reused so external references stay
/// stable across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub id: u32,
    pub rule_text: String,
    pub tags: Vec<String>,
    /// Semantic embedding slot; the embedding model is external.
    pub embedding: Vec<f32>,
    pub usage_count: u32,
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Reflection suggestion format returned by the model.
#[derive(Debug, Deserialize)]
struct Suggestion {
    action: String,
    target_id: Option<u32>,
    new_rule: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct StrategyDb {
    entries: Vec<StrategyEntry>,
    next_id: u32,
}

impl StrategyDb {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, rule_text: impl Into<String>, tags: Vec<String>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(StrategyEntry {
            id,
            rule_text: rule_text.into(),
            tags,
            embedding: Vec::new(),
            usage_count: 0,
            success_rate: 1.0,
            created_at: Utc::now(),
        });
        id
    }

    pub fn get(&self, id: u32) -> Option<&StrategyEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tag-substring similarity against a free-text query.
    fn similarity(query: &str, entry: &StrategyEntry) -> f64 {
        entry
            .tags
            .iter()
            .filter(|tag| query.contains(tag.as_str()))
            .count() as f64
            * 0.5
    }

    /// Render the top-k relevant rules as a prompt block. Returns an empty
    /// string when nothing clears the threshold.
    pub fn retrieve_relevant(
        &mut self,
        task_desc: &str,
        recent_summary: &str,
        config: &LlmConfig,
    ) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let query = format!("{task_desc} {recent_summary}");
        let mut scored: Vec<(f64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let weight = 1.0 + entry.usage_count as f64 * config.usage_weight;
                (Self::similarity(&query, entry) * weight, idx)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut block = String::new();
        let mut hits = Vec::new();
        for (score, idx) in scored.into_iter().take(config.retrieval_top_k) {
            if score > config.retrieval_threshold {
                hits.push(idx);
            }
        }
        if hits.is_empty() {
            return String::new();
        }

        block.push_str("### Relevant Strategies (Retrieved) ###\n");
        for idx in hits {
            let entry = &mut self.entries[idx];
            entry.usage_count += 1;
            let _ = writeln!(block, "- {}", entry.rule_text);
        }
        block
    }

    /// Merge a reflection suggestion. Unknown actions and missing targets
    /// are rejected, not guessed around.
    pub fn apply_suggestion(&mut self, suggestion_json: &str) -> Result<()> {
        let suggestion: Suggestion = serde_json::from_str(strip_code_fences(suggestion_json))?;

        match suggestion.action.as_str() {
            "ADD" => {
                let rule = suggestion
                    .new_rule
                    .ok_or_else(|| LlmError::InvalidResponse("ADD without new_rule".into()))?;
                let id = self.add(rule.clone(), suggestion.tags.unwrap_or_default());
                info!(id, rule = %rule, "strategy added");
                Ok(())
            }
            "MODIFY" => {
                let id = suggestion
                    .target_id
                    .ok_or_else(|| LlmError::InvalidResponse("MODIFY without target_id".into()))?;
                let rule = suggestion
                    .new_rule
                    .ok_or_else(|| LlmError::InvalidResponse("MODIFY without new_rule".into()))?;
                let entry = self
                    .entries
                    .iter_mut()
                    .find(|e| e.id == id)
                    .ok_or_else(|| {
                        LlmError::InvalidResponse(format!("MODIFY of unknown strategy {id}"))
                    })?;
                info!(id, old = %entry.rule_text, new = %rule, "strategy modified");
                entry.rule_text = rule;
                if let Some(tags) = suggestion.tags {
                    entry.tags = tags;
                }
                Ok(())
            }
            "DELETE" => {
                let id = suggestion
                    .target_id
                    .ok_or_else(|| LlmError::InvalidResponse("DELETE without target_id".into()))?;
                let before = self.entries.len();
                self.entries.retain(|e| e.id != id);
                if self.entries.len() == before {
                    return Err(LlmError::InvalidResponse(format!(
                        "DELETE of unknown strategy {id}"
                    )));
                }
                info!(id, "strategy deleted");
                Ok(())
            }
            "NONE" => Ok(()),
            other => Err(LlmError::InvalidResponse(format!(
                "unknown reflection action {other:?}"
            ))),
        }
    }
}

/// Models often wrap JSON in markdown fences; accept both forms.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Shared strategy library plus the reflection loop around it.
pub struct StrategyOptimizer {
    db: Arc<RwLock<StrategyDb>>,
    model: Arc<dyn LanguageModel>,
    config: LlmConfig,
}

impl StrategyOptimizer {
    pub fn new(model: Arc<dyn LanguageModel>, config: LlmConfig) -> Self {
        Self {
            db: Arc::new(RwLock::new(StrategyDb::new())),
            model,
            config,
        }
    }

    pub fn db(&self) -> Arc<RwLock<StrategyDb>> {
        self.db.clone()
    }

    /// RAG retrieval for a planning prompt.
    pub fn retrieve_relevant_strategies(&self, task_desc: &str, recent_summary: &str) -> String {
        self.db
            .write()
            .retrieve_relevant(task_desc, recent_summary, &self.config)
    }

    /// One reflection pass over a finished episode.
    pub async fn reflect_on_episode(&self, history: &[CognitiveEvent], success: bool) -> Result<()> {
        let prompt = self.build_reflection_prompt(history, success);
        let response = self.model.complete(&prompt).await?;
        self.db.write().apply_suggestion(&response)
    }

    /// Detached reflection: results merge into the library under its lock;
    /// failures are logged and swallowed. May outlive the episode.
    pub fn spawn_reflection(
        self: &Arc<Self>,
        handle: &Handle,
        history: Vec<CognitiveEvent>,
        success: bool,
    ) {
        let optimizer = self.clone();
        handle.spawn(async move {
            if let Err(err) = optimizer.reflect_on_episode(&history, success).await {
                warn!(error = %err, "episode reflection failed");
            }
        });
    }

    fn build_reflection_prompt(&self, history: &[CognitiveEvent], success: bool) -> String {
        let mut prompt = String::from("Analyze the interaction log below.\n");
        let _ = writeln!(
            prompt,
            "Outcome: {}",
            if success { "SUCCESS" } else { "FAILURE" }
        );

        prompt.push_str("Log:\n");
        for event in history {
            let _ = writeln!(prompt, "{} {}", event.event_type.marker(), event.summary);
        }

        prompt.push_str("\nExisting Strategies:\n");
        for entry in &self.db.read().entries {
            let _ = writeln!(prompt, "ID {}: {}", entry.id, entry.rule_text);
        }

        prompt.push_str(
            "\nTask: Should we ADD a new strategy, MODIFY an existing one, \
             DELETE one, or do NONE?\n\
             Output JSON: {\"action\": \"ADD|MODIFY|DELETE|NONE\", \
             \"target_id\": <id>, \"new_rule\": \"...\", \"tags\": [\"...\"]}",
        );
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedModel;
    use soma_core::types::EventType;

    fn config() -> LlmConfig {
        LlmConfig::default()
    }

    #[test]
    fn test_retrieval_scores_by_tags_and_usage() {
        let mut db = StrategyDb::new();
        db.add(
            "If vision is blurry, stop before planning.",
            vec!["vision".into(), "safety".into()],
        );
        db.add("Prefer shorter paths.", vec!["navigation".into()]);

        let block = db.retrieve_relevant("handle vision safety issue", "", &config());
        assert!(block.contains("If vision is blurry"));
        assert!(!block.contains("shorter paths"));
        // Retrieval bumps usage for returned entries only.
        assert_eq!(db.get(1).unwrap().usage_count, 1);
        assert_eq!(db.get(2).unwrap().usage_count, 0);
    }

    #[test]
    fn test_retrieval_below_threshold_is_empty() {
        let mut db = StrategyDb::new();
        db.add("Rule", vec!["kitchen".into()]);
        assert!(db.retrieve_relevant("unrelated query", "", &config()).is_empty());
    }

    #[test]
    fn test_apply_add_modify_delete() {
        let mut db = StrategyDb::new();
        db.apply_suggestion(r#"{"action":"ADD","new_rule":"Rule A","tags":["a"]}"#)
            .unwrap();
        assert_eq!(db.len(), 1);

        db.apply_suggestion(r#"{"action":"MODIFY","target_id":1,"new_rule":"Rule B"}"#)
            .unwrap();
        assert_eq!(db.get(1).unwrap().rule_text, "Rule B");

        db.apply_suggestion(r#"{"action":"DELETE","target_id":1}"#).unwrap();
        assert!(db.is_empty());

        // Ids are never reused after deletion.
        let id = db.add("Rule C", vec![]);
        assert_eq!(id, 2);
    }

    #[test]
    fn test_apply_rejects_malformed_suggestions() {
        let mut db = StrategyDb::new();
        assert!(db.apply_suggestion("not json").is_err());
        assert!(db.apply_suggestion(r#"{"action":"EXPLODE"}"#).is_err());
        assert!(db.apply_suggestion(r#"{"action":"MODIFY","target_id":99,"new_rule":"x"}"#).is_err());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_reflection_merges_suggestion() {
        let model = Arc::new(ScriptedModel::new(vec![
            r#"{"action":"ADD","new_rule":"If vision is BLURRY, stop movement.","tags":["vision","safety"]}"#,
        ]));
        let optimizer = StrategyOptimizer::new(model, config());

        let history = vec![CognitiveEvent::new(
            EventType::PerceptionBody,
            "Vision became BLURRY",
            serde_json::json!({}),
        )];
        optimizer.reflect_on_episode(&history, false).await.unwrap();
        assert_eq!(optimizer.db().read().len(), 1);
    }

    #[tokio::test]
    async fn test_reflection_failure_is_swallowed_when_spawned() {
        let model = Arc::new(ScriptedModel::new(vec!["garbage, not json"]));
        let optimizer = Arc::new(StrategyOptimizer::new(model, config()));
        optimizer.spawn_reflection(&Handle::current(), Vec::new(), true);
        // Give the detached task a beat to run; the library must be intact.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(optimizer.db().read().is_empty());
    }
}

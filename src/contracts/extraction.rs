//! Match-result extraction protocol.
//!
//! Renders the scores page, asks the model to read the result off it as
//! JSON, and runs the whole fetch+prompt+parse callback under strict
//! equality consensus. What validators compare is the canonical re-encoding
//! of the parsed answer, so formatting noise in the model output (fences,
//! whitespace, key order) never causes disagreement on its own.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::nondet::consensus::{ConsensusNormalizer, NondetTask};
use crate::nondet::{Oracle, RenderMode};
use crate::types::{BetError, MatchResult, NOT_FINISHED};

/// Build the extraction prompt for one match.
pub fn build_prompt(team1: &str, team2: &str, page_text: &str) -> String {
    let mut prompt = String::with_capacity(page_text.len() + 800);

    prompt.push_str("Extract the result of the football match between:\n");
    prompt.push_str(&format!("Team 1: {team1}\n"));
    prompt.push_str(&format!("Team 2: {team2}\n\n"));

    prompt.push_str("Web page content:\n");
    prompt.push_str(page_text);
    prompt.push_str("\nEnd of web page content.\n\n");

    prompt.push_str(
        "Rules:\n\
         - If you see phrases like \"Kick off\" or a kickoff time between the team names, \
         the match is NOT finished.\n\
         - If no numeric score is found for this match, assume NOT finished.\n\
         - \"score\" is \"<team 1 goals>:<team 2 goals>\", or \"-\" if not finished.\n\
         - \"winner\" is 0 for a draw, 1 if Team 1 won, 2 if Team 2 won, -1 if not finished.\n\n\
         Respond ONLY with one JSON object, no other text:\n\
         {\"score\": \"1:2\", \"winner\": 2}\n",
    );

    prompt
}

/// Remove Markdown code-fence markup around a model answer.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse a (possibly fenced) model answer into a [`MatchResult`].
///
/// `winner` may be a JSON integer or a numeric string. Codes outside
/// `-1..=2` are rejected as malformed.
pub fn parse_match_result(raw: &str) -> Result<MatchResult> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .with_context(|| format!("Model answer is not valid JSON: {cleaned}"))?;

    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Model answer is not a JSON object: {cleaned}"))?;

    let score = obj
        .get("score")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing string field \"score\": {cleaned}"))?
        .trim()
        .to_string();

    let winner = match obj.get("winner") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow::anyhow!("Missing integer field \"winner\": {cleaned}"))?;

    if !(NOT_FINISHED..=2).contains(&winner) {
        anyhow::bail!("Winner code out of range: {winner}");
    }

    if winner == NOT_FINISHED {
        if score != "-" {
            anyhow::bail!("Unfinished match must have score \"-\", got {score:?}");
        }
    } else if !is_final_score(&score) {
        anyhow::bail!("Finished match (winner {winner}) needs a \"<home>:<away>\" score, got {score:?}");
    }

    Ok(MatchResult { score, winner })
}

/// `<digits>:<digits>`
fn is_final_score(score: &str) -> bool {
    match score.split_once(':') {
        Some((home, away)) => {
            !home.is_empty()
                && !away.is_empty()
                && home.bytes().all(|b| b.is_ascii_digit())
                && away.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// The non-deterministic callback validators re-execute.
pub struct MatchResultTask<'a> {
    oracle: &'a dyn Oracle,
    resolution_url: &'a str,
    team1: &'a str,
    team2: &'a str,
}

impl<'a> MatchResultTask<'a> {
    pub fn new(oracle: &'a dyn Oracle, resolution_url: &'a str, team1: &'a str, team2: &'a str) -> Self {
        Self { oracle, resolution_url, team1, team2 }
    }
}

#[async_trait]
impl NondetTask for MatchResultTask<'_> {
    async fn run(&self) -> Result<String> {
        let page = self.oracle.render_page(self.resolution_url, RenderMode::Text).await?;
        let prompt = build_prompt(self.team1, self.team2, &page);
        let answer = self.oracle.exec_prompt(&prompt).await?;
        debug!(url = %self.resolution_url, answer = %answer, "Model answered");

        let result = parse_match_result(&answer)?;
        Ok(result.to_canonical_json())
    }

    fn label(&self) -> &str {
        "match-result"
    }
}

/// Run the extraction protocol for one match and return the agreed result.
pub async fn check_match(
    oracle: &dyn Oracle,
    consensus: &dyn ConsensusNormalizer,
    resolution_url: &str,
    team1: &str,
    team2: &str,
) -> Result<MatchResult, BetError> {
    let task = MatchResultTask::new(oracle, resolution_url, team1, team2);

    let agreed = consensus
        .strict_eq(&task)
        .await
        .map_err(|e| BetError::ExtractionConsensus(format!("{e:#}")))?;

    let result: MatchResult = serde_json::from_str(&agreed)
        .map_err(|e| BetError::ExtractionConsensus(format!("Agreed result is malformed: {e}")))?;

    info!(
        url = %resolution_url,
        team1,
        team2,
        score = %result.score,
        winner = result.winner,
        "Match result agreed"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

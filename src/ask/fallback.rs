//! Fallback Answerer: the escape hatch for questions the rules cannot answer.
//!
//! The answerer is a black box. It is only consulted after the rule executor
//! has returned "no match", and its failures never touch the rule path.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, TimelineError};
use crate::models::{Answer, Delegation};

/// A fallback answerer shared between the engine and in-flight questions.
pub type SharedAnswerer = Arc<dyn FallbackAnswerer + Send + Sync>;

pub trait FallbackAnswerer {
    /// Answer a delegated question from the filtered dataset it carries.
    fn answer(&self, delegation: &Delegation) -> Result<String>;
}

impl<F> FallbackAnswerer for F
where
    F: Fn(&Delegation) -> Result<String>,
{
    fn answer(&self, delegation: &Delegation) -> Result<String> {
        self(delegation)
    }
}

/// Posts the delegation as JSON to an HTTP endpoint and reads `{"answer": ...}`.
pub struct HttpFallback {
    endpoint: String,
    client: Client,
}

#[derive(Deserialize)]
struct FallbackResponse {
    answer: String,
}

impl HttpFallback {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

impl FallbackAnswerer for HttpFallback {
    fn answer(&self, delegation: &Delegation) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(delegation)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TimelineError::Fallback(e.to_string()))?;
        let body: FallbackResponse = resp
            .json()
            .map_err(|e| TimelineError::Fallback(format!("malformed response: {}", e)))?;
        Ok(body.answer)
    }
}

/// Hand a delegated answer to `answerer`; rule answers pass through.
///
/// Without an answerer the delegation is returned unchanged. A failing
/// answerer yields [`TimelineError::Fallback`].
pub fn resolve(answer: Answer, answerer: Option<&(dyn FallbackAnswerer + Send + Sync)>) -> Result<Answer> {
    let Answer::Delegate(delegation) = answer else {
        return Ok(answer);
    };
    let Some(answerer) = answerer else {
        return Ok(Answer::Delegate(delegation));
    };
    match answerer.answer(&delegation) {
        Ok(text) => Ok(Answer::Generated {
            question: delegation.question,
            text,
        }),
        Err(e) => {
            warn!(error = %e, "fallback answerer failed");
            Err(match e {
                TimelineError::Fallback(_) => e,
                other => TimelineError::Fallback(other.to_string()),
            })
        }
    }
}

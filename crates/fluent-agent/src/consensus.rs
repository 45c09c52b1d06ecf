// crates/fluent-agent/src/consensus.rs

//! Parallel fan-out across N models, tallied into a winning response per
//! spec §4.8. Voters are plain `Orchestrator::attempt` calls — no voter
//! walks its own fallback chain; a failed or timed-out voter abstains.

use crate::orchestrator::Orchestrator;
use fluent_core::error::RouterResult;
use fluent_core::types::{Message, Priority, RequestOptions, TaskRequirements, TaskType};
use fluent_engines::scorer;
use fluent_engines::selector::Selector;
use fluent_engines::analyzer::TaskAnalyzer;
use fluent_core::config::ScorerWeights;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrategy {
    Majority,
    Unanimous,
    Weighted,
    Synthesis,
}

#[derive(Clone)]
pub struct ConsensusOptions {
    pub strategy: ConsensusStrategy,
    pub num_voters: usize,
    pub task_type: Option<TaskType>,
    pub priority: Priority,
    pub request_options: RequestOptions,
    pub deadline: Duration,
}

impl Default for ConsensusOptions {
    fn default() -> Self {
        Self {
            strategy: ConsensusStrategy::Majority,
            num_voters: 3,
            task_type: None,
            priority: Priority::Balanced,
            request_options: RequestOptions::default(),
            deadline: Duration::from_secs(30),
        }
    }
}

/// One voter's outcome: `response` is `None` for an abstention (error or
/// deadline exceeded), matched back by `voter_id` (the model id), never by
/// arrival order (spec §5 ordering guarantees).
#[derive(Debug, Clone, serde::Serialize)]
pub struct VoteRecord {
    pub voter_id: String,
    pub response: Option<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsensusResult {
    pub strategy: ConsensusStrategy,
    pub winning_response: Option<String>,
    pub votes: Vec<VoteRecord>,
    pub quorum_lost: bool,
    pub no_consensus: bool,
}

pub struct ConsensusEngine {
    selector: Arc<Selector>,
    analyzer: Arc<TaskAnalyzer>,
    orchestrator: Arc<Orchestrator>,
    weights: ScorerWeights,
}

impl ConsensusEngine {
    pub fn new(selector: Arc<Selector>, analyzer: Arc<TaskAnalyzer>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            selector,
            analyzer,
            orchestrator,
            weights: ScorerWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ScorerWeights) -> Self {
        self.weights = weights;
        self
    }

    pub async fn consensus(
        &self,
        prompt: &str,
        options: ConsensusOptions,
        cancellation: CancellationToken,
    ) -> RouterResult<ConsensusResult> {
        let mut requirements = self.analyzer.analyze(prompt, options.task_type).await;
        requirements.priority = options.priority;

        let candidate_ids = self.selector.top_n(&requirements, options.num_voters);
        let messages = vec![Message::user(prompt.to_string())];

        let votes = self
            .fan_out(&candidate_ids, &requirements, &messages, &options, &cancellation)
            .await;

        let abstentions = votes.iter().filter(|v| v.response.is_none()).count();
        let quorum_needed = ((votes.len() + 1) / 2).max(1);
        if abstentions >= quorum_needed {
            return Ok(ConsensusResult {
                strategy: options.strategy,
                winning_response: None,
                votes,
                quorum_lost: true,
                no_consensus: false,
            });
        }

        match options.strategy {
            ConsensusStrategy::Majority => Ok(self.resolve_majority(options.strategy, votes)),
            ConsensusStrategy::Unanimous => Ok(self.resolve_unanimous(options.strategy, votes)),
            ConsensusStrategy::Weighted => Ok(self.resolve_weighted(options.strategy, votes)),
            ConsensusStrategy::Synthesis => {
                self.resolve_synthesis(options.strategy, votes, messages, &options, &cancellation).await
            }
        }
    }

    async fn fan_out(
        &self,
        candidate_ids: &[String],
        requirements: &TaskRequirements,
        messages: &[Message],
        options: &ConsensusOptions,
        cancellation: &CancellationToken,
    ) -> Vec<VoteRecord> {
        let futures = candidate_ids.iter().map(|model_id| {
            let model_id = model_id.clone();
            let messages = messages.to_vec();
            let request_options = options.request_options.clone();
            let deadline = options.deadline;
            let cancellation = cancellation.clone();
            let request_id = Uuid::new_v4().to_string();
            let weight = self
                .orchestrator
                .registry()
                .get(&model_id)
                .and_then(|cap| scorer::score(cap, requirements, &self.weights).ok())
                .unwrap_or(0.0);

            async move {
                let result = self
                    .orchestrator
                    .attempt(&model_id, messages, &request_options, &cancellation, Some(deadline), &request_id)
                    .await;
                VoteRecord {
                    voter_id: model_id,
                    response: result.ok().map(|r| r.content),
                    weight,
                }
            }
        });
        futures::future::join_all(futures).await
    }

    fn resolve_majority(&self, strategy: ConsensusStrategy, votes: Vec<VoteRecord>) -> ConsensusResult {
        let tally = tally_responses(&votes);
        let max_count = tally.values().map(|(count, _)| *count).max().unwrap_or(0);
        let winning_response = tally
            .iter()
            .filter(|(_, (count, _))| *count == max_count)
            .max_by(|(_, (_, voters_a)), (_, (_, voters_b))| {
                let best_a = voters_a.iter().map(|v| v.weight).fold(f64::MIN, f64::max);
                let best_b = voters_b.iter().map(|v| v.weight).fold(f64::MIN, f64::max);
                best_a.partial_cmp(&best_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(response, _)| response.clone());

        ConsensusResult {
            strategy,
            winning_response,
            votes,
            quorum_lost: false,
            no_consensus: false,
        }
    }

    fn resolve_unanimous(&self, strategy: ConsensusStrategy, votes: Vec<VoteRecord>) -> ConsensusResult {
        let responses: Vec<&str> = votes.iter().filter_map(|v| v.response.as_deref()).collect();
        let unanimous = responses.windows(2).all(|pair| pair[0] == pair[1]);

        ConsensusResult {
            strategy,
            winning_response: if unanimous { responses.first().map(|r| r.to_string()) } else { None },
            no_consensus: !unanimous,
            votes,
            quorum_lost: false,
        }
    }

    fn resolve_weighted(&self, strategy: ConsensusStrategy, votes: Vec<VoteRecord>) -> ConsensusResult {
        let mut weight_by_response: HashMap<String, f64> = HashMap::new();
        for vote in &votes {
            if let Some(response) = &vote.response {
                *weight_by_response.entry(response.clone()).or_insert(0.0) += vote.weight;
            }
        }
        let winning_response = weight_by_response
            .into_iter()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(response, _)| response);

        ConsensusResult {
            strategy,
            winning_response,
            votes,
            quorum_lost: false,
            no_consensus: false,
        }
    }

    /// Issues one follow-up `attempt` to the highest-weighted successful
    /// voter's model, asking it to synthesize the others' responses. No
    /// further recursion: the synthesis call itself is a plain attempt,
    /// not another `consensus` round (spec §4.8 step 4).
    async fn resolve_synthesis(
        &self,
        strategy: ConsensusStrategy,
        votes: Vec<VoteRecord>,
        original_messages: Vec<Message>,
        options: &ConsensusOptions,
        cancellation: &CancellationToken,
    ) -> RouterResult<ConsensusResult> {
        let top_voter = votes
            .iter()
            .filter(|v| v.response.is_some())
            .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal));

        let Some(top_voter) = top_voter else {
            return Ok(ConsensusResult {
                strategy,
                winning_response: None,
                votes,
                quorum_lost: false,
                no_consensus: true,
            });
        };

        let mut synthesis_prompt = String::from(
            "Multiple models answered the same prompt. Synthesize the best possible answer from their responses below.\n\n",
        );
        for vote in &votes {
            if let Some(response) = &vote.response {
                synthesis_prompt.push_str(&format!("Voter {}: {}\n\n", vote.voter_id, response));
            }
        }

        let mut messages = vec![Message::system(synthesis_prompt)];
        messages.extend(original_messages);

        let request_id = Uuid::new_v4().to_string();
        let synthesis = self
            .orchestrator
            .attempt(&top_voter.voter_id, messages, &options.request_options, cancellation, Some(options.deadline), &request_id)
            .await?;

        Ok(ConsensusResult {
            strategy,
            winning_response: Some(synthesis.content),
            votes,
            quorum_lost: false,
            no_consensus: false,
        })
    }
}

/// Groups votes by exact response text, recording the count and the
/// voters that chose it (so majority's tie-break can inspect their
/// weights without a second pass over `votes`).
fn tally_responses(votes: &[VoteRecord]) -> HashMap<String, (u32, Vec<&VoteRecord>)> {
    let mut tally: HashMap<String, (u32, Vec<&VoteRecord>)> = HashMap::new();
    for vote in votes {
        if let Some(response) = &vote.response {
            let entry = tally.entry(response.clone()).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.push(vote);
        }
    }
    tally
}

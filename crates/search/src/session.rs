//! Search sessions: the visible result set for one user's search.
//!
//! A new or refined search replaces the visible set. `load_more` fetches the
//! next page and appends whatever is not already visible. Sessions idle for
//! longer than the TTL are dropped, and the oldest one goes when the store
//! is full.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    FilterState, QuoteAggregator, SearchContext, SearchError, SupplierOutcome, SupplierQuote,
    apply_view,
};

/// Ordered, duplicate-free list of visible quotes.
#[derive(Debug, Clone, Default)]
pub struct QuoteResultSet {
    quotes: Vec<SupplierQuote>,
    seen: HashSet<(String, String)>,
}

impl QuoteResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the visible set and shows `quotes` instead.
    pub fn replace(&mut self, quotes: Vec<SupplierQuote>) {
        self.quotes.clear();
        self.seen.clear();
        self.append(quotes);
    }

    /// Appends quotes not already visible. Returns how many were added.
    pub fn append(&mut self, quotes: Vec<SupplierQuote>) -> usize {
        let before = self.quotes.len();
        for quote in quotes {
            if self.seen.insert(quote.dedup_key()) {
                self.quotes.push(quote);
            }
        }
        self.quotes.len() - before
    }

    pub fn quotes(&self) -> &[SupplierQuote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchSession {
    pub id: Uuid,
    pub context: SearchContext,
    pub results: QuoteResultSet,
    pub suppliers: Vec<SupplierOutcome>,
    /// Bumped by every replacing search; stale `load_more` results are dropped.
    generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl SearchSession {
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.updated_at)
            .to_std()
            .is_ok_and(|idle| idle >= ttl)
    }

    fn snapshot(&self, added: usize) -> SearchSnapshot {
        SearchSnapshot {
            session_id: self.id,
            page: self.context.page,
            added,
            quotes: self.results.quotes().to_vec(),
            suppliers: self.suppliers.clone(),
        }
    }
}

/// What a caller sees after a search or a load-more.
#[derive(Debug, Clone, Serialize)]
pub struct SearchSnapshot {
    pub session_id: Uuid,
    pub page: u32,
    /// Quotes added by this call.
    pub added: usize,
    pub quotes: Vec<SupplierQuote>,
    pub suppliers: Vec<SupplierOutcome>,
}

/// Identifies one quote in a session's visible set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSelection {
    pub supplier_id: String,
    pub hotel_id: String,
    pub option_id: String,
}

impl QuoteSelection {
    fn matches(&self, quote: &SupplierQuote) -> bool {
        quote.supplier_id == self.supplier_id
            && quote.hotel_id == self.hotel_id
            && quote.option_id == self.option_id
    }
}

/// A quote as the supplier returned it, with the search it answered.
#[derive(Debug, Clone)]
pub struct SelectedQuote {
    pub quote: SupplierQuote,
    pub context: SearchContext,
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Search sessions keyed by id, backed by one aggregator.
#[derive(Clone)]
pub struct SearchSessions {
    aggregator: Arc<QuoteAggregator>,
    sessions: Arc<RwLock<HashMap<Uuid, SearchSession>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SearchSessions {
    pub fn new(aggregator: Arc<QuoteAggregator>) -> Self {
        Self::with_limits(aggregator, DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_limits(aggregator: Arc<QuoteAggregator>, ttl: Duration, max_sessions: usize) -> Self {
        Self {
            aggregator,
            sessions: Arc::default(),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Sessions held, counting expired ones until the next search sweeps them.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Runs a new search, or refines an existing session. Either way the
    /// visible set is replaced.
    pub async fn search(
        &self,
        session_id: Option<Uuid>,
        context: SearchContext,
    ) -> Result<SearchSnapshot, SearchError> {
        context.validate()?;
        let context = context.with_page(1);
        let result = self.aggregator.search(&context).await;

        let mut sessions = self.sessions.write().await;
        let id = session_id.unwrap_or_else(Uuid::new_v4);
        self.make_room(&mut sessions, id);
        let session = sessions.entry(id).or_insert_with(|| SearchSession {
            id,
            context: context.clone(),
            results: QuoteResultSet::new(),
            suppliers: Vec::new(),
            generation: 0,
            updated_at: Utc::now(),
        });

        session.generation += 1;
        session.context = context;
        session.results.replace(result.quotes);
        session.suppliers = result.suppliers;
        session.updated_at = Utc::now();

        let added = session.results.len();
        Ok(session.snapshot(added))
    }

    /// Fetches the next page for a session and appends it.
    pub async fn load_more(&self, session_id: Uuid) -> Result<SearchSnapshot, SearchError> {
        let (context, generation) = {
            let sessions = self.sessions.read().await;
            let session = self.live(&sessions, session_id)?;
            (
                session.context.with_page(session.context.page + 1),
                session.generation,
            )
        };

        let result = self.aggregator.search(&context).await;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(SearchError::SessionNotFound(session_id))?;

        if session.generation != generation {
            tracing::debug!(%session_id, "discarding page superseded by a new search");
            return Ok(session.snapshot(0));
        }

        let added = session.results.append(result.quotes);
        session.context = context;
        session.suppliers = result.suppliers;
        session.updated_at = Utc::now();
        Ok(session.snapshot(added))
    }

    /// Sorts and filters the visible set without any supplier call.
    pub async fn view(
        &self,
        session_id: Uuid,
        filter: &FilterState,
    ) -> Result<Vec<SupplierQuote>, SearchError> {
        let sessions = self.sessions.read().await;
        let session = self.live(&sessions, session_id)?;
        Ok(apply_view(session.results.quotes(), filter))
    }

    /// Looks up a visible quote so a booking is priced from the supplier's
    /// copy, never from one the client sent back.
    pub async fn select(
        &self,
        session_id: Uuid,
        selection: &QuoteSelection,
    ) -> Result<SelectedQuote, SearchError> {
        let sessions = self.sessions.read().await;
        let session = self.live(&sessions, session_id)?;
        let quote = session
            .results
            .quotes()
            .iter()
            .find(|quote| selection.matches(quote))
            .cloned()
            .ok_or_else(|| SearchError::QuoteNotFound {
                session_id,
                supplier_id: selection.supplier_id.clone(),
                hotel_id: selection.hotel_id.clone(),
                option_id: selection.option_id.clone(),
            })?;
        Ok(SelectedQuote {
            quote,
            context: session.context.clone(),
        })
    }

    pub async fn get(&self, session_id: Uuid) -> Option<SearchSession> {
        let sessions = self.sessions.read().await;
        self.live(&sessions, session_id).ok().cloned()
    }

    fn live<'a>(
        &self,
        sessions: &'a HashMap<Uuid, SearchSession>,
        session_id: Uuid,
    ) -> Result<&'a SearchSession, SearchError> {
        sessions
            .get(&session_id)
            .filter(|session| !session.is_expired(self.ttl, Utc::now()))
            .ok_or(SearchError::SessionNotFound(session_id))
    }

    /// Drops expired sessions, then the least recently used one while the
    /// store is full. `keep` is about to be written and is never evicted.
    fn make_room(&self, sessions: &mut HashMap<Uuid, SearchSession>, keep: Uuid) {
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|id, session| *id == keep || !session.is_expired(self.ttl, now));

        while sessions.len() >= self.max_sessions && !sessions.contains_key(&keep) {
            let oldest = sessions
                .values()
                .min_by_key(|session| session.updated_at)
                .map(|session| session.id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before.saturating_sub(sessions.len());
        if evicted > 0 {
            tracing::debug!(evicted, "dropped idle search sessions");
            metrics::counter!("search_sessions_evicted_total").increment(evicted as u64);
        }
        metrics::gauge!("search_sessions_active").set(sessions.len() as f64);
    }
}

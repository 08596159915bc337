//! Eligibility filter: keeps only players that should be reported offline.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use playerwatch_core::Player;
use playerwatch_core::config::DataConfig;
use tracing::Span;

/// Selection rules, fixed for one run.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub ignored_groups: HashSet<String>,
    pub ignored_tags: HashSet<String>,
    /// Only these companies pass. Empty means nothing passes.
    pub allowed_companies: HashSet<String>,
    pub max_offline: Duration,
}

impl FilterConfig {
    pub fn from_data(cfg: &DataConfig) -> Self {
        Self {
            ignored_groups: cfg.ignored_groups.iter().cloned().collect(),
            ignored_tags: cfg.ignored_tags.iter().cloned().collect(),
            allowed_companies: cfg.allowed_companies.iter().cloned().collect(),
            max_offline: cfg.max_offline,
        }
    }
}

/// Why a player was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    IgnoredTag(String),
    IgnoredGroup(String),
    CompanyNotAllowed(String),
    /// Seen within the offline window.
    RecentlyOnline(TimeDelta),
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::IgnoredTag(t) => write!(f, "ignored tag '{t}'"),
            IgnoreReason::IgnoredGroup(g) => write!(f, "ignored group '{g}'"),
            IgnoreReason::CompanyNotAllowed(c) => write!(f, "company '{c}' not allowed"),
            IgnoreReason::RecentlyOnline(d) => {
                write!(f, "online {}m ago", d.num_minutes())
            }
        }
    }
}

/// Stateless filter over a player list.
pub struct PlayerFilter {
    criteria: FilterConfig,
    max_offline: TimeDelta,
    span: Span,
}

impl PlayerFilter {
    pub fn new(criteria: FilterConfig, span: Span) -> Self {
        let max_offline = TimeDelta::from_std(criteria.max_offline).unwrap_or(TimeDelta::MAX);
        Self {
            criteria,
            max_offline,
            span,
        }
    }

    /// Filter against the current wall clock.
    pub fn filter(&self, players: Vec<Player>) -> Vec<Player> {
        self.filter_at(players, Utc::now())
    }

    /// Filter as if the current time were `now`. Input order is kept.
    pub fn filter_at(&self, players: Vec<Player>, now: DateTime<Utc>) -> Vec<Player> {
        let _enter = self.span.enter();
        let start = Instant::now();
        let total = players.len();

        let kept: Vec<Player> = players
            .into_iter()
            .filter(|p| match self.ignore_reason(p, now) {
                Some(reason) => {
                    tracing::trace!(player = p.id, "Ignored: {reason}");
                    false
                }
                None => true,
            })
            .collect();

        tracing::debug!(
            filtered = kept.len(),
            total,
            elapsed = ?start.elapsed(),
            "Players filtered"
        );
        kept
    }

    /// First rule that excludes `player`, or `None` if it should be reported.
    pub fn ignore_reason(&self, player: &Player, now: DateTime<Utc>) -> Option<IgnoreReason> {
        if let Some(tag) = player
            .tags
            .iter()
            .find(|t| self.criteria.ignored_tags.contains(*t))
        {
            return Some(IgnoreReason::IgnoredTag(tag.clone()));
        }

        let group = player.root_group();
        if self.criteria.ignored_groups.contains(group) {
            return Some(IgnoreReason::IgnoredGroup(group.to_string()));
        }

        if !self.criteria.allowed_companies.contains(&player.company_name) {
            return Some(IgnoreReason::CompanyNotAllowed(player.company_name.clone()));
        }

        let offline_for = now.signed_duration_since(player.last_online);
        if offline_for <= self.max_offline {
            return Some(IgnoreReason::RecentlyOnline(offline_for));
        }

        None
    }
}

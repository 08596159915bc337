//! Record normalization: raw API records into validated [`Player`]s.
//!
//! A record that fails id, timezone or last-online parsing is logged and
//! dropped; the rest of the batch carries on. Only a payload that is not a
//! JSON array of records fails the whole batch.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDateTime;
use playerwatch_core::config::DataConfig;
use playerwatch_core::{NormalizeError, Player, PlayerwatchError, RawPlayer, Result};
use tracing::Span;

const LAST_ONLINE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a single tag token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind<'a> {
    /// Remainder after the store-number prefix.
    StoreNumber(&'a str),
    /// Remainder after the company-name prefix.
    CompanyName(&'a str),
    Other,
}

/// Builds [`Player`]s from the raw payload.
pub struct PlayerParser {
    store_test_number: i64,
    store_number_prefix: String,
    company_name_prefix: String,
    companies: HashMap<String, String>,
    span: Span,
}

impl PlayerParser {
    pub fn new(cfg: &DataConfig, span: Span) -> Self {
        Self {
            store_test_number: cfg.store_test_number,
            store_number_prefix: cfg.store_number_prefix.clone(),
            company_name_prefix: cfg.company_name_prefix.clone(),
            companies: cfg.companies.clone(),
            span,
        }
    }

    /// Parse the whole payload. Bad records are skipped, not fatal.
    pub fn parse_players(&self, body: &[u8]) -> Result<Vec<Player>> {
        let _enter = self.span.enter();
        let start = Instant::now();

        let raw: Vec<RawPlayer> = serde_json::from_slice(body).map_err(|e| {
            tracing::error!("Error unmarshalling raw players: {e}");
            PlayerwatchError::Payload(e.to_string())
        })?;

        let total = raw.len();
        let players: Vec<Player> = raw
            .into_iter()
            .filter_map(|r| match self.init_player(r) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::error!("Error initializing player: {e}");
                    None
                }
            })
            .collect();

        tracing::debug!(
            parsed = players.len(),
            total,
            elapsed = ?start.elapsed(),
            "Players parsed"
        );
        Ok(players)
    }

    /// Validate and convert one raw record.
    pub fn init_player(&self, raw: RawPlayer) -> std::result::Result<Player, NormalizeError> {
        let id = if raw.id.is_empty() {
            0
        } else {
            raw.id
                .parse::<i64>()
                .map_err(|_| NormalizeError::ParseId(raw.id.clone()))?
        };

        let time_zone_diff = raw
            .timezone_diff
            .parse::<i64>()
            .map_err(|_| NormalizeError::ParseTimezone(raw.timezone_diff.clone()))?;

        let last_online = NaiveDateTime::parse_from_str(&raw.last_online, LAST_ONLINE_FORMAT)
            .map_err(|_| NormalizeError::ParseLastOnline(raw.last_online.clone()))?
            .and_utc();

        let tags = if raw.tags.is_empty() {
            Vec::new()
        } else {
            raw.tags.split(',').map(String::from).collect()
        };

        let mut player = Player {
            number: raw.number,
            id,
            group_name: raw.group_name,
            player_name: raw.panel_name,
            tags,
            schedule_name: raw.schedule_name,
            time_zone_diff,
            last_online,
            serial: raw.serial,
            mac: format_mac(&raw.mac),
            ip: raw.ip,
            device_type: raw.device_type,
            model: raw.model,
            version: raw.version,
            store_number: 0,
            company_name: String::new(),
        };

        self.apply_tags(&mut player);
        Ok(player)
    }

    /// Derive `store_number` and `company_name` from prefixed tags.
    ///
    /// Tags are read in order and later matches overwrite earlier ones.
    /// Unusable store tags leave the current store number untouched.
    pub fn apply_tags(&self, player: &mut Player) {
        let mut store_number = player.store_number;
        let mut company_name = None;

        for tag in &player.tags {
            match self.classify(tag) {
                TagKind::StoreNumber("") => {
                    tracing::debug!(player = player.id, "Empty store number tag");
                }
                TagKind::StoreNumber(value) => match value.parse::<i64>() {
                    Ok(n) if n == self.store_test_number => {
                        tracing::debug!(player = player.id, "Skipping test store number {n}");
                    }
                    Ok(n) => store_number = n,
                    Err(e) => {
                        tracing::error!(
                            player = player.id,
                            "Error converting number tag '{value}' to int: {e}"
                        );
                    }
                },
                TagKind::CompanyName("") => {
                    tracing::warn!(player = player.id, "Empty company name tag");
                }
                TagKind::CompanyName(value) => match self.companies.get(value) {
                    Some(name) => company_name = Some(name.clone()),
                    None => {
                        tracing::warn!(player = player.id, "Unknown company name: {value}");
                        company_name = Some(value.to_string());
                    }
                },
                TagKind::Other => {}
            }
        }

        player.store_number = store_number;
        if let Some(name) = company_name {
            player.company_name = name;
        }
    }

    fn classify<'a>(&self, tag: &'a str) -> TagKind<'a> {
        if let Some(rest) = tag.strip_prefix(self.store_number_prefix.as_str()) {
            TagKind::StoreNumber(rest)
        } else if let Some(rest) = tag.strip_prefix(self.company_name_prefix.as_str()) {
            TagKind::CompanyName(rest)
        } else {
            TagKind::Other
        }
    }
}

/// Normalize a hardware address to `AA:BB:CC:DD:EE:FF`.
///
/// Every non-hex character is dropped first, so `aa-bb-cc-dd-ee-ff`,
/// `AABB.CCDD.EEFF` and `aa:bb:cc:dd:ee:ff` all give the same result.
/// Anything that does not leave exactly 12 hex digits yields `""`.
pub fn format_mac(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let hex: Vec<char> = raw
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if hex.len() != 12 {
        tracing::warn!("Invalid MAC address: '{raw}'");
        return String::new();
    }

    hex.chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PlayerParser {
        let cfg = DataConfig {
            store_test_number: 999,
            store_number_prefix: "store:".into(),
            company_name_prefix: "company:".into(),
            companies: HashMap::from([("acme".to_string(), "Acme Corp".to_string())]),
            ..DataConfig::default()
        };
        PlayerParser::new(&cfg, Span::none())
    }

    fn raw(id: &str, tags: &str) -> RawPlayer {
        RawPlayer {
            number: 1,
            id: id.into(),
            group_name: "North/Mall".into(),
            panel_name: "Entrance".into(),
            tags: tags.into(),
            timezone_diff: "3".into(),
            last_online: "2026-01-02 03:04:05".into(),
            mac: "aa-bb-cc-dd-ee-ff".into(),
            ..RawPlayer::default()
        }
    }

    #[test]
    fn test_init_player() {
        let p = parser().init_player(raw("42", "store:12,company:acme,vip")).unwrap();
        assert_eq!(p.id, 42);
        assert_eq!(p.time_zone_diff, 3);
        assert_eq!(p.last_online.to_string(), "2026-01-02 03:04:05 UTC");
        assert_eq!(p.tags, vec!["store:12", "company:acme", "vip"]);
        assert_eq!(p.mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(p.store_number, 12);
        assert_eq!(p.company_name, "Acme Corp");
    }

    #[test]
    fn test_empty_id_is_zero() {
        let p = parser().init_player(raw("", "")).unwrap();
        assert_eq!(p.id, 0);
        assert!(p.tags.is_empty());
        assert_eq!(p.store_number, 0);
        assert_eq!(p.company_name, "");
    }

    #[test]
    fn test_parse_errors() {
        let p = parser();
        assert_eq!(
            p.init_player(raw("abc", "")).unwrap_err(),
            NormalizeError::ParseId("abc".into())
        );

        let mut bad_tz = raw("1", "");
        bad_tz.timezone_diff = String::new();
        assert!(matches!(
            p.init_player(bad_tz),
            Err(NormalizeError::ParseTimezone(_))
        ));

        let mut bad_time = raw("1", "");
        bad_time.last_online = "2026-01-02T03:04:05Z".into();
        assert!(matches!(
            p.init_player(bad_time),
            Err(NormalizeError::ParseLastOnline(_))
        ));
    }

    #[test]
    fn test_bad_record_does_not_abort_batch() {
        let body = serde_json::to_vec(&vec![
            raw("1", "store:1"),
            raw("not-a-number", "store:2"),
            raw("3", "store:3"),
        ])
        .unwrap();
        let players = parser().parse_players(&body).unwrap();
        let ids: Vec<i64> = players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_malformed_payload_fails_batch() {
        let err = parser().parse_players(br#"{"not": "an array"}"#).unwrap_err();
        assert!(matches!(err, PlayerwatchError::Payload(_)));
    }

    #[test]
    fn test_null_field_keeps_record() {
        let body = br#"[
            {"id": "1", "timezone_diff": "0", "last_online": "2026-01-02 03:04:05", "serial": null},
            {"id": "2", "timezone_diff": "0", "last_online": "2026-01-02 03:04:05", "number": null}
        ]"#;
        let players = parser().parse_players(body).unwrap();
        let ids: Vec<i64> = players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(players[0].serial, "");
        assert_eq!(players[1].number, 0);
    }

    #[test]
    fn test_wide_timezone_offset() {
        let mut r = raw("1", "");
        r.timezone_diff = "4294967296".into();
        let p = parser().init_player(r).unwrap();
        assert_eq!(p.time_zone_diff, 4_294_967_296);
    }

    #[test]
    fn test_last_store_tag_wins() {
        let p = parser().init_player(raw("1", "store:5,store:7")).unwrap();
        assert_eq!(p.store_number, 7);
    }

    #[test]
    fn test_test_store_number_is_skipped() {
        let p = parser().init_player(raw("1", "store:5,store:999")).unwrap();
        assert_eq!(p.store_number, 5);

        let p = parser().init_player(raw("1", "store:999")).unwrap();
        assert_eq!(p.store_number, 0);
    }

    #[test]
    fn test_bad_store_tags_leave_number_unchanged() {
        let p = parser().init_player(raw("1", "store:8,store:,store:x9")).unwrap();
        assert_eq!(p.store_number, 8);
    }

    #[test]
    fn test_company_mapping() {
        let p = parser().init_player(raw("1", "company:acme,company:globex")).unwrap();
        assert_eq!(p.company_name, "globex");

        let p = parser().init_player(raw("1", "company:globex,company:acme")).unwrap();
        assert_eq!(p.company_name, "Acme Corp");

        let p = parser().init_player(raw("1", "company:")).unwrap();
        assert_eq!(p.company_name, "");
    }

    #[test]
    fn test_format_mac() {
        assert_eq!(format_mac("aa-bb-cc-dd-ee-ff"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(format_mac("AABB.CCDD.EEFF"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(format_mac("0a:1b:2c:3d:4e:5f"), "0A:1B:2C:3D:4E:5F");
        assert_eq!(format_mac("invalid"), "");
        assert_eq!(format_mac(""), "");
        assert_eq!(format_mac("aa:bb:cc:dd:ee"), "");
        assert_eq!(format_mac("aa:bb:cc:dd:ee:ff:00"), "");
    }
}

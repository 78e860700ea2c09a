//! Grouping of flat cost records into a [`CostSummary`].
//!
//! Everything here is pure: records are borrowed, never mutated, and the
//! same input always yields the same output. Grouping goes through
//! `BTreeMap`s and ties in sort order are broken by label so that repeated
//! calls are bit-identical.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{
    AccountBreakdown, CloudProvider, CostRecord, CostSummary, CostTrendPoint, DateRange,
    Granularity, ProviderBreakdown, RegionBreakdown, ServiceBreakdown, TagAllocation,
    TagAllocationEntry, Variation,
};

#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions<'a> {
    pub range: DateRange,
    pub granularity: Granularity,
    /// Records from the comparison period; fills each entry's `trend`.
    pub previous: Option<&'a [CostRecord]>,
}

impl<'a> SummaryOptions<'a> {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            granularity: Granularity::Daily,
            previous: None,
        }
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn compare_with(mut self, previous: &'a [CostRecord]) -> Self {
        self.previous = Some(previous);
        self
    }
}

pub fn summarize(records: &[CostRecord], options: &SummaryOptions<'_>) -> CostSummary {
    let total = total_cost(records);
    let currency = records
        .first()
        .map(|r| r.currency.clone())
        .unwrap_or_else(|| "USD".into());

    let mut by_provider = provider_breakdown(records);
    let mut by_service = service_breakdown(records);
    let mut by_account = account_breakdown(records);
    let mut by_region = region_breakdown(records);

    if let Some(previous) = options.previous {
        let prev_provider = costs_by(previous, |r| Some(r.provider.to_string()));
        for entry in &mut by_provider {
            entry.trend = trend_against(entry.cost, prev_provider.get(&entry.provider.to_string()));
        }
        let prev_service = costs_by(previous, |r| Some(service_key(r)));
        for entry in &mut by_service {
            let key = format!("{}|{}", entry.service, entry.provider);
            entry.trend = trend_against(entry.cost, prev_service.get(&key));
        }
        let prev_account = costs_by(previous, |r| Some(r.account_id.clone()));
        for entry in &mut by_account {
            entry.trend = trend_against(entry.cost, prev_account.get(&entry.account_id));
        }
        let prev_region = costs_by(previous, |r| r.region.clone());
        for entry in &mut by_region {
            entry.trend = trend_against(entry.cost, prev_region.get(&entry.region));
        }
    }

    CostSummary {
        total_cost: total,
        currency,
        start_date: options.range.start,
        end_date: options.range.end,
        by_provider,
        by_service,
        by_account,
        by_region,
        trend: cost_trend(records, options.granularity),
        month_over_month: month_over_month(records, options.range.end),
    }
}

pub fn total_cost(records: &[CostRecord]) -> f64 {
    records.iter().map(|r| r.cost).sum()
}

/// `cost / total * 100`, or 0 when the total is 0 or the ratio is not finite.
pub fn percentage_of(cost: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let pct = cost / total * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

#[derive(Default)]
struct Group {
    cost: f64,
    provider: Option<CloudProvider>,
    services: BTreeSet<String>,
    accounts: BTreeSet<String>,
    regions: BTreeSet<String>,
    providers: BTreeSet<CloudProvider>,
}

impl Group {
    fn add(&mut self, record: &CostRecord) {
        self.cost += record.cost;
        self.provider.get_or_insert(record.provider);
        self.services.insert(record.service.clone());
        self.accounts.insert(record.account_id.clone());
        if let Some(region) = &record.region {
            self.regions.insert(region.clone());
        }
        self.providers.insert(record.provider);
    }
}

fn group_by<K, F>(records: &[CostRecord], key: F) -> BTreeMap<K, Group>
where
    K: Ord,
    F: Fn(&CostRecord) -> Option<K>,
{
    let mut groups: BTreeMap<K, Group> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(record) {
            groups.entry(k).or_default().add(record);
        }
    }
    groups
}

fn costs_by<F>(records: &[CostRecord], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&CostRecord) -> Option<String>,
{
    group_by(records, key)
        .into_iter()
        .map(|(k, g)| (k, g.cost))
        .collect()
}

fn service_key(record: &CostRecord) -> String {
    format!("{}|{}", record.service, record.provider)
}

fn trend_against(current: f64, previous: Option<&f64>) -> f64 {
    match previous {
        Some(prev) if *prev != 0.0 => {
            let pct = (current - prev) / prev.abs() * 100.0;
            if pct.is_finite() {
                pct
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Descending by cost, then ascending by label.
fn by_cost_desc(a_cost: f64, a_label: &str, b_cost: f64, b_label: &str) -> Ordering {
    b_cost.total_cmp(&a_cost).then_with(|| a_label.cmp(b_label))
}

pub fn provider_breakdown(records: &[CostRecord]) -> Vec<ProviderBreakdown> {
    let total = total_cost(records);
    let mut entries: Vec<ProviderBreakdown> = group_by(records, |r| Some(r.provider))
        .into_iter()
        .map(|(provider, g)| ProviderBreakdown {
            provider,
            cost: g.cost,
            percentage: percentage_of(g.cost, total),
            service_count: g.services.len(),
            account_count: g.accounts.len(),
            trend: 0.0,
        })
        .collect();
    entries.sort_by(|a, b| {
        by_cost_desc(a.cost, &a.provider.to_string(), b.cost, &b.provider.to_string())
    });
    entries
}

/// Grouped on service and provider together, so "Storage" on two clouds
/// stays two entries.
pub fn service_breakdown(records: &[CostRecord]) -> Vec<ServiceBreakdown> {
    let total = total_cost(records);
    let mut entries: Vec<ServiceBreakdown> =
        group_by(records, |r| Some((r.service.clone(), r.provider)))
            .into_iter()
            .map(|((service, provider), g)| ServiceBreakdown {
                service,
                provider,
                cost: g.cost,
                percentage: percentage_of(g.cost, total),
                account_count: g.accounts.len(),
                region_count: g.regions.len(),
                trend: 0.0,
            })
            .collect();
    entries.sort_by(|a, b| {
        by_cost_desc(a.cost, &a.service, b.cost, &b.service)
            .then_with(|| a.provider.cmp(&b.provider))
    });
    entries
}

pub fn account_breakdown(records: &[CostRecord]) -> Vec<AccountBreakdown> {
    let total = total_cost(records);
    let mut entries: Vec<AccountBreakdown> = group_by(records, |r| Some(r.account_id.clone()))
        .into_iter()
        .map(|(account_id, g)| AccountBreakdown {
            account_id,
            provider: g.provider.unwrap_or(CloudProvider::Other),
            cost: g.cost,
            percentage: percentage_of(g.cost, total),
            service_count: g.services.len(),
            trend: 0.0,
        })
        .collect();
    entries.sort_by(|a, b| by_cost_desc(a.cost, &a.account_id, b.cost, &b.account_id));
    entries
}

/// Records without a region are left out, but percentages stay relative to
/// the overall total.
pub fn region_breakdown(records: &[CostRecord]) -> Vec<RegionBreakdown> {
    let total = total_cost(records);
    let mut entries: Vec<RegionBreakdown> = group_by(records, |r| r.region.clone())
        .into_iter()
        .map(|(region, g)| RegionBreakdown {
            region,
            cost: g.cost,
            percentage: percentage_of(g.cost, total),
            service_count: g.services.len(),
            provider_count: g.providers.len(),
            trend: 0.0,
        })
        .collect();
    entries.sort_by(|a, b| by_cost_desc(a.cost, &a.region, b.cost, &b.region));
    entries
}

/// Start date of the bucket `date` falls into.
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        Granularity::Monthly => date.with_day(1).unwrap_or(date),
    }
}

pub fn cost_trend(records: &[CostRecord], granularity: Granularity) -> Vec<CostTrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        *buckets
            .entry(bucket_start(record.usage_date, granularity))
            .or_insert(0.0) += record.cost;
    }
    buckets
        .into_iter()
        .map(|(date, cost)| CostTrendPoint { date, cost })
        .collect()
}

/// One point per calendar day of `range`; days without records cost 0.
/// Records outside `range` are ignored.
pub fn daily_series(records: &[CostRecord], range: DateRange) -> Vec<CostTrendPoint> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records.iter().filter(|r| range.contains(r.usage_date)) {
        *by_day.entry(record.usage_date).or_insert(0.0) += record.cost;
    }
    range
        .start
        .iter_days()
        .take_while(|date| *date <= range.end)
        .map(|date| CostTrendPoint {
            date,
            cost: by_day.get(&date).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Cost of the calendar month containing `anchor` against the month before.
pub fn month_over_month(records: &[CostRecord], anchor: NaiveDate) -> Variation {
    let current_month = bucket_start(anchor, Granularity::Monthly);
    let previous_month = bucket_start(current_month - Duration::days(1), Granularity::Monthly);

    let mut current = 0.0;
    let mut previous = 0.0;
    for record in records {
        let month = bucket_start(record.usage_date, Granularity::Monthly);
        if month == current_month {
            current += record.cost;
        } else if month == previous_month {
            previous += record.cost;
        }
    }
    Variation::between(current, previous)
}

/// Splits cost by the value of one tag key. Records lacking the key, or
/// carrying an empty value, count as untagged.
pub fn tag_allocation(records: &[CostRecord], tag_key: &str) -> TagAllocation {
    let total = total_cost(records);
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut untagged = 0.0;

    for record in records {
        match record.tags.get(tag_key).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => {
                let slot = groups.entry(value.to_string()).or_insert((0.0, 0));
                slot.0 += record.cost;
                slot.1 += 1;
            }
            _ => untagged += record.cost,
        }
    }

    let mut entries: Vec<TagAllocationEntry> = groups
        .into_iter()
        .map(|(value, (cost, record_count))| TagAllocationEntry {
            value,
            cost,
            percentage: percentage_of(cost, total),
            record_count,
        })
        .collect();
    entries.sort_by(|a, b| by_cost_desc(a.cost, &a.value, b.cost, &b.value));

    TagAllocation {
        tag_key: tag_key.to_string(),
        entries,
        untagged_cost: untagged,
        untagged_percentage: percentage_of(untagged, total),
        total_cost: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Tags};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(provider: CloudProvider, service: &str, cost: f64) -> CostRecord {
        CostRecord {
            provider,
            account_id: "acct-1".into(),
            service: service.into(),
            region: Some("us-east-1".into()),
            usage_date: date(2026, 3, 1),
            cost,
            currency: "USD".into(),
            tags: Tags::new(),
        }
    }

    fn sample() -> Vec<CostRecord> {
        let mut records = vec![
            record(CloudProvider::Aws, "EC2", 100.0),
            record(CloudProvider::Aws, "S3", 50.0),
            record(CloudProvider::Aws, "EC2", 20.0),
            record(CloudProvider::Gcp, "BigQuery", 30.0),
            record(CloudProvider::Azure, "VM", 45.0),
        ];
        records[1].account_id = "acct-2".into();
        records[3].account_id = "proj-9".into();
        records[3].region = None;
        records[4].account_id = "sub-3".into();
        records[4].region = Some("westeurope".into());
        records[4].usage_date = date(2026, 2, 20);
        records
    }

    fn options<'a>() -> SummaryOptions<'a> {
        SummaryOptions::new(DateRange::new(date(2026, 2, 1), date(2026, 3, 31)))
    }

    #[test]
    fn test_service_breakdown_example() {
        let records = vec![
            record(CloudProvider::Aws, "EC2", 100.0),
            record(CloudProvider::Aws, "S3", 50.0),
            record(CloudProvider::Aws, "EC2", 20.0),
        ];
        let services = service_breakdown(&records);

        assert_eq!(services.len(), 2);
        assert_eq!(services[0].service, "EC2");
        assert_eq!(services[0].cost, 120.0);
        assert!((services[0].percentage - 70.588).abs() < 0.001);
        assert_eq!(services[1].service, "S3");
        assert_eq!(services[1].cost, 50.0);
        assert!((services[1].percentage - 29.412).abs() < 0.001);
    }

    #[test]
    fn test_breakdowns_sum_to_total() {
        let records = sample();
        let summary = summarize(&records, &options());

        assert_eq!(summary.total_cost, 245.0);
        let tolerance = 1e-9;
        let providers: f64 = summary.by_provider.iter().map(|e| e.cost).sum();
        let services: f64 = summary.by_service.iter().map(|e| e.cost).sum();
        let accounts: f64 = summary.by_account.iter().map(|e| e.cost).sum();
        assert!((providers - summary.total_cost).abs() < tolerance);
        assert!((services - summary.total_cost).abs() < tolerance);
        assert!((accounts - summary.total_cost).abs() < tolerance);
    }

    #[test]
    fn test_breakdowns_sorted_descending() {
        let summary = summarize(&sample(), &options());

        assert!(summary.by_provider.windows(2).all(|w| w[0].cost >= w[1].cost));
        assert!(summary.by_service.windows(2).all(|w| w[0].cost >= w[1].cost));
        assert!(summary.by_account.windows(2).all(|w| w[0].cost >= w[1].cost));
        assert!(summary.by_region.windows(2).all(|w| w[0].cost >= w[1].cost));
    }

    #[test]
    fn test_percentages_bounded() {
        let summary = summarize(&sample(), &options());
        for pct in summary
            .by_provider
            .iter()
            .map(|e| e.percentage)
            .chain(summary.by_service.iter().map(|e| e.percentage))
            .chain(summary.by_region.iter().map(|e| e.percentage))
        {
            assert!((0.0..=100.0).contains(&pct), "percentage {pct} out of range");
        }
    }

    #[test]
    fn test_zero_total_percentages() {
        let records = vec![
            record(CloudProvider::Aws, "EC2", 0.0),
            record(CloudProvider::Gcp, "GCS", 0.0),
        ];
        let summary = summarize(&records, &options());
        assert_eq!(summary.total_cost, 0.0);
        assert!(summary.by_provider.iter().all(|e| e.percentage == 0.0));
        assert!(summary.by_service.iter().all(|e| e.percentage == 0.0));
    }

    #[test]
    fn test_empty_records() {
        let summary = summarize(&[], &options());
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.currency, "USD");
        assert!(summary.by_provider.is_empty());
        assert!(summary.trend.is_empty());
        assert_eq!(summary.month_over_month.direction, Direction::Unchanged);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let records = sample();
        let first = summarize(&records, &options());
        let second = summarize(&records, &options());
        assert_eq!(first, second);
    }

    #[test]
    fn test_region_breakdown_skips_missing_region() {
        let regions = region_breakdown(&sample());
        let names: Vec<&str> = regions.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(names, vec!["us-east-1", "westeurope"]);
        assert_eq!(regions[0].cost, 170.0);
        // Percentages are relative to the full total, including region-less spend.
        assert!((regions[0].percentage - 170.0 / 245.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_provider_distinct_counts() {
        let providers = provider_breakdown(&sample());
        let aws = providers
            .iter()
            .find(|p| p.provider == CloudProvider::Aws)
            .unwrap();
        assert_eq!(aws.cost, 170.0);
        assert_eq!(aws.service_count, 2);
        assert_eq!(aws.account_count, 2);
    }

    #[test]
    fn test_service_key_includes_provider() {
        let records = vec![
            record(CloudProvider::Aws, "Storage", 10.0),
            record(CloudProvider::Azure, "Storage", 30.0),
        ];
        let services = service_breakdown(&records);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].provider, CloudProvider::Azure);
        assert_eq!(services[1].provider, CloudProvider::Aws);
    }

    #[test]
    fn test_ties_broken_by_label() {
        let mut records = vec![
            record(CloudProvider::Aws, "b", 10.0),
            record(CloudProvider::Aws, "a", 10.0),
        ];
        records[0].account_id = "z".into();
        records[1].account_id = "y".into();
        let accounts = account_breakdown(&records);
        assert_eq!(accounts[0].account_id, "y");
        assert_eq!(accounts[1].account_id, "z");
    }

    #[test]
    fn test_daily_trend_ascending() {
        let mut records = sample();
        records.push(CostRecord {
            usage_date: date(2026, 3, 2),
            ..record(CloudProvider::Aws, "EC2", 5.0)
        });
        let trend = cost_trend(&records, Granularity::Daily);
        assert_eq!(
            trend,
            vec![
                CostTrendPoint { date: date(2026, 2, 20), cost: 45.0 },
                CostTrendPoint { date: date(2026, 3, 1), cost: 200.0 },
                CostTrendPoint { date: date(2026, 3, 2), cost: 5.0 },
            ]
        );
    }

    #[test]
    fn test_daily_series_fills_missing_days() {
        let mut records = sample();
        records.push(CostRecord {
            usage_date: date(2026, 3, 4),
            ..record(CloudProvider::Aws, "EC2", 5.0)
        });
        let series = daily_series(&records, DateRange::new(date(2026, 3, 1), date(2026, 3, 5)));

        let costs: Vec<f64> = series.iter().map(|p| p.cost).collect();
        assert_eq!(costs, vec![200.0, 0.0, 0.0, 5.0, 0.0]);
        assert_eq!(series[0].date, date(2026, 3, 1));
        assert_eq!(series[4].date, date(2026, 3, 5));
    }

    #[test]
    fn test_daily_series_empty_inputs() {
        let range = DateRange::new(date(2026, 3, 1), date(2026, 3, 3));
        let series = daily_series(&[], range);
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(|p| p.cost == 0.0));

        let inverted = DateRange::new(date(2026, 3, 3), date(2026, 3, 1));
        assert!(daily_series(&sample(), inverted).is_empty());
    }

    #[test]
    fn test_weekly_and_monthly_buckets() {
        // 2026-03-04 is a Wednesday.
        assert_eq!(bucket_start(date(2026, 3, 4), Granularity::Weekly), date(2026, 3, 2));
        assert_eq!(bucket_start(date(2026, 3, 2), Granularity::Weekly), date(2026, 3, 2));
        assert_eq!(bucket_start(date(2026, 3, 31), Granularity::Monthly), date(2026, 3, 1));

        let trend = cost_trend(&sample(), Granularity::Monthly);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0], CostTrendPoint { date: date(2026, 2, 1), cost: 45.0 });
        assert_eq!(trend[1], CostTrendPoint { date: date(2026, 3, 1), cost: 200.0 });
    }

    #[test]
    fn test_month_over_month() {
        let mom = month_over_month(&sample(), date(2026, 3, 15));
        assert_eq!(mom.current, 200.0);
        assert_eq!(mom.previous, 45.0);
        assert_eq!(mom.direction, Direction::Increase);

        // Anchor in January: neither month is present.
        let empty = month_over_month(&sample(), date(2026, 1, 10));
        assert_eq!(empty.current, 0.0);
        assert_eq!(empty.percentage, 0.0);
    }

    #[test]
    fn test_trend_against_previous_period() {
        let current = vec![
            record(CloudProvider::Aws, "EC2", 150.0),
            record(CloudProvider::Aws, "S3", 40.0),
            record(CloudProvider::Gcp, "GCS", 10.0),
        ];
        let previous = vec![
            record(CloudProvider::Aws, "EC2", 100.0),
            record(CloudProvider::Aws, "S3", 50.0),
        ];
        let opts = options().compare_with(&previous);
        let summary = summarize(&current, &opts);

        let ec2 = summary.by_service.iter().find(|s| s.service == "EC2").unwrap();
        let s3 = summary.by_service.iter().find(|s| s.service == "S3").unwrap();
        let gcs = summary.by_service.iter().find(|s| s.service == "GCS").unwrap();
        assert_eq!(ec2.trend, 50.0);
        assert_eq!(s3.trend, -20.0);
        assert_eq!(gcs.trend, 0.0);

        let aws = summary
            .by_provider
            .iter()
            .find(|p| p.provider == CloudProvider::Aws)
            .unwrap();
        assert!((aws.trend - 26.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_trend_zero_without_previous() {
        let summary = summarize(&sample(), &options());
        assert!(summary.by_service.iter().all(|s| s.trend == 0.0));
        assert!(summary.by_account.iter().all(|a| a.trend == 0.0));
    }

    #[test]
    fn test_first_record_currency_is_nominal() {
        let mut records = sample();
        records[0].currency = "EUR".into();
        let summary = summarize(&records, &options());
        assert_eq!(summary.currency, "EUR");
        assert_eq!(summary.total_cost, 245.0);
    }

    #[test]
    fn test_tag_allocation() {
        let mut records = sample();
        records[0].tags.insert("team".into(), "platform".into());
        records[1].tags.insert("team".into(), "data".into());
        records[2].tags.insert("team".into(), "platform".into());
        records[3].tags.insert("team".into(), "  ".into());

        let allocation = tag_allocation(&records, "team");
        assert_eq!(allocation.total_cost, 245.0);
        assert_eq!(allocation.entries.len(), 2);
        assert_eq!(allocation.entries[0].value, "platform");
        assert_eq!(allocation.entries[0].cost, 120.0);
        assert_eq!(allocation.entries[0].record_count, 2);
        assert_eq!(allocation.entries[1].value, "data");
        assert_eq!(allocation.untagged_cost, 75.0);
        assert!((allocation.untagged_percentage - 75.0 / 245.0 * 100.0).abs() < 1e-9);
    }
}

//! Feedback-campaign targeting.
//!
//! Selection is pure over in-memory slices; the attribution write and
//! impression bump it triggers live in the repository.

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    parse_rfc3339, CampaignAttribution, FeedbackCampaign, Plan, SegmentCondition, SegmentField,
    SegmentOp, SegmentRule, User,
};

// givingUpAlmost: new-ish, free-plan, returned-but-slow, low engagement.
const GIVING_UP_MAX_ACCOUNT_AGE_DAYS: i64 = 30;
const GIVING_UP_MIN_LOGINS: i64 = 2;
const GIVING_UP_MAX_PROJECTS: i64 = 1;
const GIVING_UP_MAX_SCORE: i64 = 20;

/// Age of the user's account in whole days.
fn account_age_days(user: &User, now: DateTime<Utc>) -> i64 {
    match parse_rfc3339(&user.created_at) {
        Some(created) => (now - created).num_days(),
        None => i64::MAX, // unparseable accounts are treated as old
    }
}

fn compare_i64(actual: i64, op: SegmentOp, expected: i64) -> bool {
    match op {
        SegmentOp::Eq => actual == expected,
        SegmentOp::Ne => actual != expected,
        SegmentOp::Lt => actual < expected,
        SegmentOp::Lte => actual <= expected,
        SegmentOp::Gt => actual > expected,
        SegmentOp::Gte => actual >= expected,
    }
}

fn condition_matches(cond: &SegmentCondition, user: &User, now: DateTime<Utc>) -> bool {
    match cond.field {
        SegmentField::Plan => {
            let Some(expected) = cond.value.as_str() else {
                return false;
            };
            match cond.op {
                SegmentOp::Eq => user.plan.as_str() == expected,
                SegmentOp::Ne => user.plan.as_str() != expected,
                _ => false, // plans have no ordering
            }
        }
        SegmentField::EngagementScore => match cond.value.as_i64() {
            Some(v) => compare_i64(user.engagement_score, cond.op, v),
            None => false,
        },
        SegmentField::LoginCount => match cond.value.as_i64() {
            Some(v) => compare_i64(user.login_count, cond.op, v),
            None => false,
        },
        SegmentField::ProjectCount => match cond.value.as_i64() {
            Some(v) => compare_i64(user.project_count, cond.op, v),
            None => false,
        },
        SegmentField::AccountAgeDays => match cond.value.as_i64() {
            Some(v) => compare_i64(account_age_days(user, now), cond.op, v),
            None => false,
        },
    }
}

/// Whether a segment rule matches the user.
pub fn segment_matches(rule: &SegmentRule, user: &User, now: DateTime<Utc>) -> bool {
    match rule {
        SegmentRule::All => true,
        SegmentRule::GivingUpAlmost => {
            account_age_days(user, now) <= GIVING_UP_MAX_ACCOUNT_AGE_DAYS
                && user.plan == Plan::Free
                && user.login_count >= GIVING_UP_MIN_LOGINS
                && user.project_count <= GIVING_UP_MAX_PROJECTS
                && user.engagement_score < GIVING_UP_MAX_SCORE
        }
        SegmentRule::Conditions { conditions } => conditions
            .iter()
            .all(|cond| condition_matches(cond, user, now)),
    }
}

/// Whether the campaign's active window contains `now`.
///
/// Applies to every selection rule, including targeted and forced overrides;
/// an expired campaign is never shown.
fn is_active(campaign: &FeedbackCampaign, now: DateTime<Utc>) -> bool {
    let started = match parse_rfc3339(&campaign.active_from) {
        Some(from) => from <= now,
        None => false,
    };
    let not_ended = match &campaign.active_until {
        Some(until) => parse_rfc3339(until).map(|u| u > now).unwrap_or(false),
        None => true,
    };
    started && not_ended
}

/// Whether the frequency cap allows showing the campaign to this user again.
fn cap_allows(
    campaign: &FeedbackCampaign,
    attributions: &[CampaignAttribution],
    now: DateTime<Utc>,
) -> bool {
    let Some(attr) = attributions.iter().find(|a| a.campaign_id == campaign.id) else {
        return true;
    };
    match parse_rfc3339(&attr.shown_at) {
        Some(shown) => now - shown > Duration::days(campaign.frequency_cap_days),
        None => true,
    }
}

/// Select at most one campaign to show the user.
///
/// Precedence: explicit per-user targeting, then the forced debug override,
/// then the first segment match ordered by `active_from` descending whose
/// frequency cap has elapsed.
pub fn select_campaign<'a>(
    campaigns: &'a [FeedbackCampaign],
    attributions: &[CampaignAttribution],
    user: &User,
    now: DateTime<Utc>,
) -> Option<&'a FeedbackCampaign> {
    if let Some(targeted) = campaigns
        .iter()
        .find(|c| is_active(c, now) && c.targeted_user_ids.iter().any(|id| id == &user.id))
    {
        return Some(targeted);
    }

    if let Some(forced) = campaigns.iter().find(|c| is_active(c, now) && c.force_show) {
        return Some(forced);
    }

    let mut ordered: Vec<&FeedbackCampaign> = campaigns.iter().collect();
    ordered.sort_by(|a, b| b.active_from.cmp(&a.active_from));

    ordered.into_iter().find(|c| {
        is_active(c, now)
            && segment_matches(&c.segment, user, now)
            && cap_allows(c, attributions, now)
    })
}

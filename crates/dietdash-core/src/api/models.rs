//! Response models for the dashboard views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One coaching insight shown on the coach dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CoachInsight {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "body", alias = "text")]
    pub message: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "createdAt")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
}

/// A past meal plan as listed in the history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MealPlanSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(alias = "createdAt")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "totalCalories")]
    pub total_calories: Option<f64>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "Array<unknown>"))]
    pub meals: Vec<serde_json::Value>,
}

impl MealPlanSummary {
    pub fn meal_count(&self) -> usize {
        self.meals.len()
    }

    /// Calories rounded for display, or a dash when unknown
    pub fn calories_display(&self) -> String {
        match self.total_calories {
            Some(kcal) => format!("{:.0} kcal", kcal),
            None => "-".to_string(),
        }
    }
}

/// List endpoints answer with a bare array or an object wrapping one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "items", alias = "insights", alias = "meal_plans", alias = "mealPlans")]
        results: Vec<T>,
    },
}

impl<T> ListResponse<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) => items,
            ListResponse::Wrapped { results } => results,
        }
    }
}

/// Newest insight first; undated insights sink to the bottom.
pub fn sort_insights(insights: &mut [CoachInsight]) {
    insights.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Newest plan first.
pub fn sort_meal_plans(plans: &mut [MealPlanSummary]) {
    plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_and_bare_lists() {
        let bare = r#"[{"title":"Hydrate","message":"Drink more water"}]"#;
        let parsed: ListResponse<CoachInsight> = serde_json::from_str(bare).unwrap();
        assert_eq!(parsed.into_vec().len(), 1);

        let wrapped = r#"{"data":[{"title":"Protein","body":"Add eggs","createdAt":"2026-01-02T08:00:00Z"}]}"#;
        let parsed: ListResponse<CoachInsight> = serde_json::from_str(wrapped).unwrap();
        let insights = parsed.into_vec();
        assert_eq!(insights[0].message, "Add eggs");
        assert!(insights[0].created_at.is_some());
    }

    #[test]
    fn test_sort_meal_plans_newest_first() {
        let json = r#"{"mealPlans":[
            {"name":"Week 1","createdAt":"2026-01-01T00:00:00Z","totalCalories":1850.4},
            {"name":"Week 3","createdAt":"2026-01-15T00:00:00Z","meals":[{},{}]},
            {"name":"Week 2","createdAt":"2026-01-08T00:00:00Z"}
        ]}"#;
        let mut plans = serde_json::from_str::<ListResponse<MealPlanSummary>>(json)
            .unwrap()
            .into_vec();
        sort_meal_plans(&mut plans);

        let titles: Vec<&str> = plans.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Week 3", "Week 2", "Week 1"]);
        assert_eq!(plans[0].meal_count(), 2);
        assert_eq!(plans[0].calories_display(), "-");
        assert_eq!(plans[2].calories_display(), "1850 kcal");
    }

    #[test]
    fn test_sort_insights_undated_last() {
        let mut insights: Vec<CoachInsight> = serde_json::from_str(
            r#"[{"title":"old","createdAt":"2026-01-01T00:00:00Z"},{"title":"none"},{"title":"new","createdAt":"2026-02-01T00:00:00Z"}]"#,
        )
        .unwrap();
        sort_insights(&mut insights);
        let titles: Vec<&str> = insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["new", "old", "none"]);
    }
}

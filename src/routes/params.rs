use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    #[default]
    Daily,
    Monthly,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportQuery {
    #[serde(default)]
    pub period: ReportPeriod,
}

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContributionMode {
    #[default]
    Fixed,
    SalaryPercent,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Windfall {
    pub amount: f64,
    pub age_received: u32,
}

/// One projection request. Percent fields are whole percentages, so `10.0`
/// means 10%.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    pub starting_investments: f64,
    pub contribution_mode: ContributionMode,
    pub monthly_contributions: f64,
    pub adjust_contributions_for_inflation: bool,
    pub annual_salary: f64,
    pub salary_contribution_percent: f64,
    pub salary_annual_raise_percent: f64,
    pub current_age: u32,
    pub annual_expenses: f64,
    pub annual_return: f64,
    pub inflation_rate: f64,
    pub withdrawal_rate: f64,
    pub windfalls: Vec<Windfall>,
}

impl Inputs {
    /// Copy with the fields the selected contribution mode ignores zeroed out.
    pub fn normalized(&self) -> Self {
        let mut inputs = self.clone();
        match inputs.contribution_mode {
            ContributionMode::Fixed => {
                inputs.annual_salary = 0.0;
                inputs.salary_contribution_percent = 0.0;
                inputs.salary_annual_raise_percent = 0.0;
            }
            ContributionMode::SalaryPercent => {
                inputs.monthly_contributions = 0.0;
                inputs.adjust_contributions_for_inflation = false;
            }
        }
        inputs
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FireStatus {
    Short,
    Windfall,
    Fire,
}

impl FireStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FireStatus::Short => "short",
            FireStatus::Windfall => "windfall",
            FireStatus::Fire => "fire",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    pub age: u32,
    pub year: i32,
    pub balance: f64,
    pub contribution: f64,
    pub withdrawal_nominal: f64,
    pub withdrawal_real: f64,
    pub fire_target: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windfall_amount: Option<f64>,
    pub investment_growth: f64,
    pub status: FireStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub real_fire_number: f64,
    pub nominal_fire_number: f64,
    pub achievable_age: u32,
    pub years_to_retirement: i64,
    pub projection_data: Vec<ProjectionYear>,
}

impl ProjectionResult {
    pub fn first_fire_year(&self) -> Option<&ProjectionYear> {
        self.projection_data
            .iter()
            .find(|row| row.status == FireStatus::Fire)
    }

    pub fn reached_fire(&self) -> bool {
        self.first_fire_year().is_some()
    }
}

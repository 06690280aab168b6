use super::types::{
    ContributionMode, FireStatus, Inputs, ProjectionResult, ProjectionYear, Windfall,
};

pub const MAX_PROJECTION_YEARS: u32 = 40;
pub const MAX_AGE: u32 = 100;

#[derive(Debug, Default)]
struct FireTracker {
    achieved: bool,
    achievable_age: u32,
}

impl FireTracker {
    fn update(
        &mut self,
        age: u32,
        balance: f64,
        fire_target: f64,
        status: FireStatus,
    ) -> FireStatus {
        if balance >= fire_target && !self.achieved {
            self.achieved = true;
            self.achievable_age = age;
            FireStatus::Fire
        } else if self.achieved {
            FireStatus::Fire
        } else {
            status
        }
    }
}

pub fn project(inputs: &Inputs, start_year: i32) -> ProjectionResult {
    let inputs = inputs.normalized();
    let real_fire_number = inputs.annual_expenses / (inputs.withdrawal_rate / 100.0);

    let mut balance = inputs.starting_investments;
    let mut age = inputs.current_age;
    let mut tracker = FireTracker::default();
    let mut projection_data = Vec::with_capacity(MAX_PROJECTION_YEARS as usize);

    for year in 0..MAX_PROJECTION_YEARS {
        if age > MAX_AGE {
            break;
        }

        let inflation_factor = compound_factor(inputs.inflation_rate, year);
        let fire_target = real_fire_number * inflation_factor;

        let contribution = contribution_for_year(&inputs, year);
        balance += contribution;

        let windfall = windfall_at_age(&inputs.windfalls, age);
        let mut status = FireStatus::Short;
        if let Some(windfall) = windfall {
            balance += windfall.amount;
            status = FireStatus::Windfall;
        }

        let pre_growth = balance;
        balance *= 1.0 + inputs.annual_return / 100.0;
        let investment_growth = balance - pre_growth;

        let withdrawal_nominal = balance * (inputs.withdrawal_rate / 100.0);
        let withdrawal_real = withdrawal_nominal / inflation_factor;

        status = tracker.update(age, balance, fire_target, status);

        projection_data.push(ProjectionYear {
            age,
            year: start_year.saturating_add(year as i32),
            balance: round_to_thousand(balance),
            contribution: round_to_thousand(contribution),
            withdrawal_nominal: round_to_thousand(withdrawal_nominal),
            withdrawal_real: round_to_thousand(withdrawal_real),
            fire_target: round_to_thousand(fire_target),
            windfall_amount: windfall
                .map(|w| w.amount)
                .filter(|amount| *amount > 0.0)
                .map(round_to_thousand),
            investment_growth: round_to_thousand(investment_growth),
            status,
        });

        age += 1;
    }

    let achievable_age = if tracker.achieved {
        tracker.achievable_age
    } else {
        age - 1
    };
    let years_to_retirement = i64::from(achievable_age) - i64::from(inputs.current_age);
    let nominal_fire_number =
        real_fire_number * (1.0 + inputs.inflation_rate / 100.0).powf(years_to_retirement as f64);

    ProjectionResult {
        real_fire_number: round_to_thousand(real_fire_number),
        nominal_fire_number: round_to_thousand(nominal_fire_number),
        achievable_age,
        years_to_retirement,
        projection_data,
    }
}

pub fn round_to_thousand(value: f64) -> f64 {
    // Adding positive zero folds `-0.0` into `0.0`.
    (value / 1000.0).round() * 1000.0 + 0.0
}

fn compound_factor(rate_percent: f64, years: u32) -> f64 {
    (1.0 + rate_percent / 100.0).powf(f64::from(years))
}

fn contribution_for_year(inputs: &Inputs, year: u32) -> f64 {
    match inputs.contribution_mode {
        ContributionMode::SalaryPercent => {
            let salary =
                inputs.annual_salary * compound_factor(inputs.salary_annual_raise_percent, year);
            salary * (inputs.salary_contribution_percent / 100.0)
        }
        ContributionMode::Fixed => {
            let base = inputs.monthly_contributions * 12.0;
            if inputs.adjust_contributions_for_inflation {
                base * compound_factor(inputs.inflation_rate, year)
            } else {
                base
            }
        }
    }
}

fn windfall_at_age(windfalls: &[Windfall], age: u32) -> Option<&Windfall> {
    windfalls.iter().find(|w| w.age_received == age)
}

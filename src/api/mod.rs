use anyhow::Context;
use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Datelike;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{ContributionMode, Inputs, MAX_AGE, ProjectionResult, Windfall, project};
use crate::export::{format_currency_full, projection_csv_string};

const MAX_WINDFALL_AGE: u32 = 120;
const MAX_RAISE_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliContributionMode {
    Fixed,
    SalaryPercent,
}

impl From<CliContributionMode> for ContributionMode {
    fn from(value: CliContributionMode) -> Self {
        match value {
            CliContributionMode::Fixed => ContributionMode::Fixed,
            CliContributionMode::SalaryPercent => ContributionMode::SalaryPercent,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiContributionMode {
    Fixed,
    #[serde(alias = "salaryPercent", alias = "salary_percent")]
    SalaryPercent,
}

impl From<ApiContributionMode> for CliContributionMode {
    fn from(value: ApiContributionMode) -> Self {
        match value {
            ApiContributionMode::Fixed => CliContributionMode::Fixed,
            ApiContributionMode::SalaryPercent => CliContributionMode::SalaryPercent,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectionPayload {
    starting_investments: Option<f64>,
    contribution_mode: Option<ApiContributionMode>,
    monthly_contributions: Option<f64>,
    adjust_contributions_for_inflation: Option<bool>,
    annual_salary: Option<f64>,
    salary_contribution_percent: Option<f64>,
    salary_annual_raise_percent: Option<f64>,
    current_age: Option<u32>,
    annual_expenses: Option<f64>,
    annual_return: Option<f64>,
    inflation_rate: Option<f64>,
    withdrawal_rate: Option<f64>,
    windfalls: Option<Vec<Windfall>>,
    start_year: Option<i32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "fire-projection",
    about = "Deterministic FIRE projection: year-by-year balance, target and retirement age",
    after_help = "Run `fire-projection serve [port]` to start the HTTP API instead."
)]
struct Cli {
    #[arg(
        long,
        default_value_t = 150_000.0,
        help = "Invested assets today, in today's dollars"
    )]
    starting_investments: f64,
    #[arg(long, value_enum, default_value_t = CliContributionMode::Fixed)]
    contribution_mode: CliContributionMode,
    #[arg(
        long,
        default_value_t = 1_200.0,
        help = "Monthly contribution, used with --contribution-mode=fixed"
    )]
    monthly_contributions: f64,
    #[arg(
        long,
        help = "Grow the fixed contribution with inflation each year"
    )]
    adjust_contributions_for_inflation: bool,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Gross annual salary, used with --contribution-mode=salary-percent"
    )]
    annual_salary: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Share of salary invested each year in percent"
    )]
    salary_contribution_percent: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual salary raise in percent"
    )]
    salary_annual_raise_percent: f64,
    #[arg(long, default_value_t = 26)]
    current_age: u32,
    #[arg(
        long,
        default_value_t = 200_000.0,
        help = "Annual spending in retirement, in today's dollars"
    )]
    annual_expenses: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        allow_negative_numbers = true,
        help = "Expected annual investment return in percent"
    )]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        allow_negative_numbers = true,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Safe withdrawal rate in percent"
    )]
    withdrawal_rate: f64,
    #[arg(
        long = "windfall",
        value_name = "AMOUNT@AGE",
        value_parser = parse_windfall,
        help = "One-time cash inflow, e.g. 500000@40; repeatable"
    )]
    windfalls: Vec<Windfall>,
    #[arg(long, help = "Calendar year of the first projected row, defaults to this year")]
    start_year: Option<i32>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug)]
struct ProjectionRequest {
    inputs: Inputs,
    start_year: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    start_year: i32,
    #[serde(flatten)]
    result: ProjectionResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn parse_windfall(raw: &str) -> Result<Windfall, String> {
    let (amount, age) = raw
        .split_once('@')
        .ok_or_else(|| format!("expected AMOUNT@AGE, got `{raw}`"))?;
    let amount = amount
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid windfall amount `{amount}`: {e}"))?;
    let age_received = age
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid windfall age `{age}`: {e}"))?;
    Ok(Windfall {
        amount,
        age_received,
    })
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn build_inputs(cli: Cli) -> Result<Inputs, ValidationError> {
    let contribution_mode: ContributionMode = cli.contribution_mode.into();

    let mut numeric_fields = vec![
        ("startingInvestments", cli.starting_investments),
        ("annualExpenses", cli.annual_expenses),
        ("annualReturn", cli.annual_return),
        ("inflationRate", cli.inflation_rate),
        ("withdrawalRate", cli.withdrawal_rate),
    ];
    match contribution_mode {
        ContributionMode::Fixed => {
            numeric_fields.push(("monthlyContributions", cli.monthly_contributions));
        }
        ContributionMode::SalaryPercent => {
            numeric_fields.push(("annualSalary", cli.annual_salary));
            numeric_fields.push(("salaryContributionPercent", cli.salary_contribution_percent));
            numeric_fields.push(("salaryAnnualRaisePercent", cli.salary_annual_raise_percent));
        }
    }
    for (field, value) in numeric_fields {
        if !value.is_finite() {
            return Err(invalid(field, "must be a finite number"));
        }
    }

    if cli.starting_investments < 0.0 {
        return Err(invalid("startingInvestments", "must be >= 0"));
    }

    match contribution_mode {
        ContributionMode::Fixed => {
            if cli.monthly_contributions < 0.0 {
                return Err(invalid("monthlyContributions", "must be >= 0"));
            }
        }
        ContributionMode::SalaryPercent => {
            if cli.annual_salary < 0.0 {
                return Err(invalid("annualSalary", "must be >= 0"));
            }
            if !(0.0..=100.0).contains(&cli.salary_contribution_percent) {
                return Err(invalid(
                    "salaryContributionPercent",
                    "must be between 0 and 100",
                ));
            }
            if !(0.0..=MAX_RAISE_PERCENT).contains(&cli.salary_annual_raise_percent) {
                return Err(invalid(
                    "salaryAnnualRaisePercent",
                    format!("must be between 0 and {MAX_RAISE_PERCENT}"),
                ));
            }
        }
    }

    if cli.current_age > MAX_AGE {
        return Err(invalid("currentAge", format!("must be <= {MAX_AGE}")));
    }

    if cli.annual_expenses <= 0.0 {
        return Err(invalid("annualExpenses", "must be > 0"));
    }

    if cli.annual_return <= -100.0 {
        return Err(invalid("annualReturn", "must be > -100"));
    }

    if cli.inflation_rate <= -100.0 {
        return Err(invalid("inflationRate", "must be > -100"));
    }

    if cli.withdrawal_rate <= 0.0 || cli.withdrawal_rate > 100.0 {
        return Err(invalid("withdrawalRate", "must be > 0 and <= 100"));
    }

    for (idx, windfall) in cli.windfalls.iter().enumerate() {
        if !windfall.amount.is_finite() || windfall.amount <= 0.0 {
            return Err(invalid(format!("windfalls[{idx}].amount"), "must be > 0"));
        }
        if windfall.age_received > MAX_WINDFALL_AGE {
            return Err(invalid(
                format!("windfalls[{idx}].ageReceived"),
                format!("must be <= {MAX_WINDFALL_AGE}"),
            ));
        }
    }

    let inputs = Inputs {
        starting_investments: cli.starting_investments,
        contribution_mode,
        monthly_contributions: cli.monthly_contributions,
        adjust_contributions_for_inflation: cli.adjust_contributions_for_inflation,
        annual_salary: cli.annual_salary,
        salary_contribution_percent: cli.salary_contribution_percent,
        salary_annual_raise_percent: cli.salary_annual_raise_percent,
        current_age: cli.current_age,
        annual_expenses: cli.annual_expenses,
        annual_return: cli.annual_return,
        inflation_rate: cli.inflation_rate,
        withdrawal_rate: cli.withdrawal_rate,
        windfalls: cli.windfalls,
    };
    Ok(inputs.normalized())
}

pub fn run_cli<I, T>(args: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let format = cli.format;
    let start_year = cli.start_year.unwrap_or_else(current_year);
    let inputs = build_inputs(cli)?;

    log::debug!(
        "projecting from age {} in {start_year} ({:?} contributions, {} windfalls)",
        inputs.current_age,
        inputs.contribution_mode,
        inputs.windfalls.len()
    );
    let result = project(&inputs, start_year);

    let output = match format {
        OutputFormat::Table => render_table(&result),
        OutputFormat::Json => {
            let response = ProjectionResponse { start_year, result };
            let json = serde_json::to_string_pretty(&response)
                .context("failed to serialize projection as JSON")?;
            format!("{json}\n")
        }
        OutputFormat::Csv => projection_csv_string(&result.projection_data)
            .context("failed to render projection CSV")?,
    };
    Ok(output)
}

fn render_table(result: &ProjectionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "FIRE number (today's dollars):  {}",
        format_currency_full(result.real_fire_number)
    );
    let _ = writeln!(
        out,
        "FIRE number (at retirement):    {}",
        format_currency_full(result.nominal_fire_number)
    );
    if result.reached_fire() {
        let _ = writeln!(
            out,
            "FIRE reached at age {} ({} years from now)",
            result.achievable_age, result.years_to_retirement
        );
    } else {
        let _ = writeln!(
            out,
            "FIRE not reached by age {} ({} years projected)",
            result.achievable_age, result.years_to_retirement
        );
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{:>4} {:>5} {:>15} {:>13} {:>13} {:>15} {:>13} {:>9}",
        "Age",
        "Year",
        "Balance",
        "Contribution",
        "Real Withdraw",
        "FIRE Target",
        "Windfall",
        "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(94));
    for row in &result.projection_data {
        let windfall = row
            .windfall_amount
            .map(format_currency_full)
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>4} {:>5} {:>15} {:>13} {:>13} {:>15} {:>13} {:>9}",
            row.age,
            row.year,
            format_currency_full(row.balance),
            format_currency_full(row.contribution),
            format_currency_full(row.withdrawal_real),
            format_currency_full(row.fire_target),
            windfall,
            row.status.as_str(),
        );
    }
    out
}

pub async fn run_http_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route(
            "/api/projection.csv",
            get(projection_csv_get_handler).post(projection_csv_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("FIRE projection API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/projection");

    axum::serve(listener, app)
        .await
        .context("HTTP server stopped unexpectedly")
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn projection_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    projection_handler_impl(payload).await
}

async fn projection_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    projection_handler_impl(payload).await
}

async fn projection_csv_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    projection_csv_handler_impl(payload).await
}

async fn projection_csv_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    projection_csv_handler_impl(payload).await
}

async fn projection_handler_impl(payload: ProjectionPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(err),
    };

    let result = project(&request.inputs, request.start_year);
    log::debug!(
        "projection from age {}: achievable age {}, {} rows",
        request.inputs.current_age,
        result.achievable_age,
        result.projection_data.len()
    );
    json_response(
        StatusCode::OK,
        ProjectionResponse {
            start_year: request.start_year,
            result,
        },
    )
}

async fn projection_csv_handler_impl(payload: ProjectionPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(err),
    };

    let result = project(&request.inputs, request.start_year);
    match projection_csv_string(&result.projection_data) {
        Ok(csv) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"fire-projection.csv\"",
                ),
            ],
            csv,
        )),
        Err(err) => {
            log::error!("CSV export failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string(), None)
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str, field: Option<String>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            field,
        },
    )
}

fn validation_error_response(err: ValidationError) -> Response {
    log::warn!("rejected projection request: {err}");
    let message = err.to_string();
    error_response(StatusCode::BAD_REQUEST, &message, Some(err.field))
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ProjectionRequest, String> {
    let payload = serde_json::from_str::<ProjectionPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(
    payload: ProjectionPayload,
) -> Result<ProjectionRequest, ValidationError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.starting_investments {
        cli.starting_investments = v;
    }
    if let Some(v) = payload.contribution_mode {
        cli.contribution_mode = v.into();
    }
    if let Some(v) = payload.monthly_contributions {
        cli.monthly_contributions = v;
    }
    if let Some(v) = payload.adjust_contributions_for_inflation {
        cli.adjust_contributions_for_inflation = v;
    }
    if let Some(v) = payload.annual_salary {
        cli.annual_salary = v;
    }
    if let Some(v) = payload.salary_contribution_percent {
        cli.salary_contribution_percent = v;
    }
    if let Some(v) = payload.salary_annual_raise_percent {
        cli.salary_annual_raise_percent = v;
    }
    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.annual_expenses {
        cli.annual_expenses = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        cli.withdrawal_rate = v;
    }
    if let Some(v) = payload.windfalls {
        cli.windfalls = v;
    }

    let start_year = payload.start_year.unwrap_or_else(current_year);
    let inputs = build_inputs(cli)?;
    Ok(ProjectionRequest { inputs, start_year })
}

fn default_cli_for_api() -> Cli {
    Cli {
        starting_investments: 150_000.0,
        contribution_mode: CliContributionMode::Fixed,
        monthly_contributions: 1_200.0,
        adjust_contributions_for_inflation: false,
        annual_salary: 0.0,
        salary_contribution_percent: 0.0,
        salary_annual_raise_percent: 0.0,
        current_age: 26,
        annual_expenses: 200_000.0,
        annual_return: 10.0,
        inflation_rate: 3.0,
        withdrawal_rate: 4.0,
        windfalls: Vec::new(),
        start_year: None,
        format: OutputFormat::Json,
    }
}

mod aggregate;
mod calendar;
mod capture;
mod config;
mod db;
mod display;
mod error;
mod models;
mod normalize;
mod progression;
mod store;
mod telemetry;
mod tui;

use std::io::Read;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::Value;

use capture::Ingested;
use config::Config;
use db::Database;
use display::{format_credits, format_number, truncate};
use models::{CourseRecord, JsonOutput};
use progression::Progression;
use store::{CourseStore, COURSES_KEY};

const DEFAULT_DB_NAME: &str = "studyquest.db";

#[derive(Parser)]
#[command(name = "studyquest")]
#[command(about = "Turns your course results into credits per term, XP and a level")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Store a captured course-information payload
    Ingest {
        /// JSON file with a capture envelope or a bare payload, `-` for stdin
        file: String,

        /// Course id to store the payload under
        #[arg(long, short)]
        course_id: Option<String>,

        /// Url the payload was fetched from; its kursUID segment is the course id
        #[arg(long, short)]
        url: Option<String>,
    },

    /// List stored courses
    Courses,

    /// Show one course with its modules
    Course {
        /// Course id or course code
        id: String,
    },

    /// Show credit statistics per month and term
    Stats {
        /// Date treated as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },

    /// Show level and XP
    Level {
        /// Completed credits (defaults to the stored total)
        #[arg(long)]
        completed: Option<f64>,

        /// Programme credits (defaults to the configured total)
        #[arg(long)]
        total: Option<f64>,
    },

    /// Show which term a date belongs to
    Term {
        /// Date (YYYY-MM-DD)
        date: String,
    },

    /// Manage settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective settings
    Show,

    /// Change one setting
    Set {
        /// Setting name, e.g. levelExponent
        key: String,

        /// New value
        value: String,
    },

    /// Restore the default settings
    Reset,
}

fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("STUDYQUEST_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studyquest");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn main() {
    telemetry::init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path();
    let db = Database::open(&db_path)?;
    db.init()?;

    match cli.command {
        Commands::Init => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Ingest {
            file,
            course_id,
            url,
        } => {
            let input = read_input(&file)?;
            match capture::ingest(&db, &input, course_id.as_deref(), url.as_deref())? {
                Ingested::Stored(record) => {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&record))?);
                    } else {
                        println!(
                            "Stored {} ({} modules, {} passed).",
                            record.display_name(),
                            record.modules.len(),
                            record.modules_passed()
                        );
                    }
                }
                Ingested::Rejected(reason) => {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::err(reason))?);
                    } else {
                        println!("Nothing stored: {}.", reason);
                    }
                }
            }
        }

        Commands::Courses => {
            let courses = CourseStore::new(&db).get_all()?;
            if cli.json {
                let list: Vec<&CourseRecord> = courses.values().collect();
                println!("{}", serde_json::to_string(&JsonOutput::ok(list))?);
            } else if courses.is_empty() {
                println!("No courses stored. Ingest a capture first.");
            } else {
                println!("{:<12} {:<40} {:>6} MODULES", "CODE", "NAME", "HP");
                println!("{}", "-".repeat(72));
                for course in courses.values() {
                    println!(
                        "{:<12} {:<40} {:>6} {}/{}",
                        course.course_code.as_deref().unwrap_or("-"),
                        truncate(course.display_name(), 38),
                        format_credits(course.course_credits),
                        course.modules_passed(),
                        course.modules.len()
                    );
                }
                if let Some(updated) = db.updated_at(COURSES_KEY)? {
                    println!();
                    println!("Last updated: {}", updated);
                }
            }
        }

        Commands::Course { id } => {
            let store = CourseStore::new(&db);
            let found = match store.get(&id)? {
                Some(course) => Some(course),
                None => store.find_by_course_code(&id)?,
            };

            if let Some(course) = found {
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&course))?);
                } else {
                    print_course(&course, &config::load(&db)?);
                }
            } else if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::<()>::err("Course not found"))?
                );
            } else {
                println!("Course not found.");
            }
        }

        Commands::Stats { today } => {
            let today = match today {
                Some(text) => parse_date_arg(&text)?,
                None => Local::now().date_naive(),
            };
            let config = config::load(&db)?;
            let courses = CourseStore::new(&db).get_all()?;
            let result = aggregate::aggregate(&courses, &config, today);
            let status = Progression::new(config.program_credits, config.level_exponent)
                .status(result.total_credits);

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "aggregate": result,
                        "level": status
                    })))?
                );
            } else if !result.has_data {
                println!("No statistics yet. Ingest a capture first.");
            } else {
                println!("=== Study Statistics ===");
                println!("{}", result.coverage(None));
                println!(
                    "Modules passed: {}/{}",
                    result.modules_passed, result.modules_total
                );
                println!("Credits: {} hp", format_number(result.total_credits));
                println!("Level: {} ({:.0}%)", status.level, status.percent);

                println!();
                println!("--- Terms ---");
                for term in &result.term_series {
                    let marker = if term.label == result.current_term_label {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:<12} {:>6} hp  {} modules",
                        marker,
                        term.label,
                        format_number(term.credits),
                        term.module_count
                    );
                }

                println!();
                println!("--- Months ---");
                for point in &result.series {
                    let marker = if point.key == result.current_month_key {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {}  {:>6} hp  total {:>6} hp",
                        marker,
                        point.key,
                        format_number(point.credits),
                        format_number(point.cumulative_credits)
                    );
                }
            }
        }

        Commands::Level { completed, total } => {
            let config = config::load(&db)?;
            let completed = match completed {
                Some(c) => c,
                None => {
                    let courses = CourseStore::new(&db).get_all()?;
                    aggregate::aggregate(&courses, &config, Local::now().date_naive())
                        .total_credits
                }
            };
            let progression =
                Progression::new(total.unwrap_or(config.program_credits), config.level_exponent);
            let status = progression.status(completed);

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "progression": progression,
                        "status": status
                    })))?
                );
            } else {
                println!("Level {}", status.level);
                println!(
                    "XP: {:.0} / {} ({:.0}% of level {})",
                    status.xp, progression.xp_total, status.percent, status.next_level
                );
                if config.show_xp_to_next && status.level < progression::LEVEL_CAP {
                    println!(
                        "{:.0} XP to level {}",
                        (status.xp_next_level - status.xp).max(0.0),
                        status.next_level
                    );
                }
            }
        }

        Commands::Term { date } => {
            let date = parse_date_arg(&date)?;
            let term = calendar::term_range_of(date, &config::load(&db)?);
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&term))?);
            } else {
                let current = if term.contains(Local::now().date_naive()) {
                    " (current)"
                } else {
                    ""
                };
                println!("{}: {} to {}{}", term.label, term.start, term.end, current);
            }
        }

        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => {
                let config = config::load(&db)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&config))?);
                } else {
                    print_config(&config)?;
                }
            }

            ConfigCommands::Set { key, value } => {
                let config = config::set_option(&db, &key, &value)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&config))?);
                } else {
                    println!("Updated {}.", key);
                }
            }

            ConfigCommands::Reset => {
                config::save(&db, &Config::default())?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(Config::default()))?
                    );
                } else {
                    println!("Settings restored to defaults.");
                }
            }
        },

        Commands::Tui => {
            tui::run(db)?;
        }
    }

    Ok(())
}

fn read_input(file: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let text = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };
    Ok(serde_json::from_str(&text)?)
}

fn parse_date_arg(text: &str) -> Result<NaiveDate, error::Error> {
    calendar::parse_date(text)
        .ok_or_else(|| error::Error::InvalidInput(format!("Invalid date '{}', use YYYY-MM-DD", text)))
}

fn print_course(course: &CourseRecord, config: &Config) {
    println!("Course: {}", course.display_name());
    println!("ID: {}", course.course_id);
    if let Some(code) = &course.course_code {
        println!("Code: {}", code);
    }
    println!("Credits: {} hp", format_credits(course.course_credits));
    if let (Some(start), Some(end)) = (&course.term_start, &course.term_end) {
        println!("Runs: {} to {}", start, end);
    }
    if let Some(result) = &course.course_result {
        println!("Result: {}", result.grade_label());
    }
    println!("Last seen: {}", course.last_seen_at.format("%Y-%m-%d %H:%M"));

    if !course.modules.is_empty() {
        println!();
        println!("--- Modules ---");
        for module in &course.modules {
            let grade = module
                .latest
                .as_ref()
                .map(|r| r.grade_label())
                .unwrap_or("-");
            let date = aggregate::module_date(module, config)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<8} {:<36} {:>5} {:<3} {}",
                module.module_code.as_deref().unwrap_or("-"),
                truncate(&module.name, 34),
                format_credits(module.credits),
                grade,
                date
            );
        }
    }
}

fn print_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Value::Object(map) = serde_json::to_value(config)? {
        for (key, value) in map {
            println!("{:<24} {}", key, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod date_argument_tests {
        use super::*;

        #[test]
        fn date_argument() {
            assert_eq!(
                parse_date_arg("2024-10-15").unwrap(),
                NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
            );
            assert!(parse_date_arg("yesterday").is_err());
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["studyquest", "init"]).unwrap();
            assert!(!cli.json);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_init_with_json() {
            let cli = Cli::try_parse_from(["studyquest", "--json", "init"]).unwrap();
            assert!(cli.json);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_ingest_file() {
            let cli = Cli::try_parse_from(["studyquest", "ingest", "capture.json"]).unwrap();
            match cli.command {
                Commands::Ingest {
                    file,
                    course_id,
                    url,
                } => {
                    assert_eq!(file, "capture.json");
                    assert!(course_id.is_none());
                    assert!(url.is_none());
                }
                _ => panic!("Expected Ingest command"),
            }
        }

        #[test]
        fn parse_ingest_stdin_with_course_id() {
            let cli =
                Cli::try_parse_from(["studyquest", "ingest", "-", "--course-id", "abc"]).unwrap();
            match cli.command {
                Commands::Ingest {
                    file, course_id, ..
                } => {
                    assert_eq!(file, "-");
                    assert_eq!(course_id, Some("abc".to_string()));
                }
                _ => panic!("Expected Ingest command"),
            }
        }

        #[test]
        fn parse_ingest_short_flags() {
            let cli = Cli::try_parse_from(["studyquest", "ingest", "p.json", "-c", "abc", "-u", "/x"])
                .unwrap();
            match cli.command {
                Commands::Ingest { course_id, url, .. } => {
                    assert_eq!(course_id, Some("abc".to_string()));
                    assert_eq!(url, Some("/x".to_string()));
                }
                _ => panic!("Expected Ingest command"),
            }
        }

        #[test]
        fn parse_courses_command() {
            let cli = Cli::try_parse_from(["studyquest", "courses"]).unwrap();
            assert!(matches!(cli.command, Commands::Courses));
        }

        #[test]
        fn parse_course_command() {
            let cli = Cli::try_parse_from(["studyquest", "course", "TDA555"]).unwrap();
            match cli.command {
                Commands::Course { id } => assert_eq!(id, "TDA555"),
                _ => panic!("Expected Course command"),
            }
        }

        #[test]
        fn parse_stats_command() {
            let cli = Cli::try_parse_from(["studyquest", "stats"]).unwrap();
            assert!(matches!(cli.command, Commands::Stats { today: None }));
        }

        #[test]
        fn parse_stats_with_today() {
            let cli = Cli::try_parse_from(["studyquest", "stats", "--today", "2024-10-15"]).unwrap();
            match cli.command {
                Commands::Stats { today } => assert_eq!(today, Some("2024-10-15".to_string())),
                _ => panic!("Expected Stats command"),
            }
        }

        #[test]
        fn parse_level_command() {
            let cli = Cli::try_parse_from([
                "studyquest",
                "level",
                "--completed",
                "22.5",
                "--total",
                "45",
            ])
            .unwrap();
            match cli.command {
                Commands::Level { completed, total } => {
                    assert_eq!(completed, Some(22.5));
                    assert_eq!(total, Some(45.0));
                }
                _ => panic!("Expected Level command"),
            }
        }

        #[test]
        fn parse_term_command() {
            let cli = Cli::try_parse_from(["studyquest", "term", "2024-10-15"]).unwrap();
            match cli.command {
                Commands::Term { date } => assert_eq!(date, "2024-10-15"),
                _ => panic!("Expected Term command"),
            }
        }

        #[test]
        fn parse_config_commands() {
            let cli = Cli::try_parse_from(["studyquest", "config", "show"]).unwrap();
            assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));

            let cli =
                Cli::try_parse_from(["studyquest", "config", "set", "levelExponent", "1.5"]).unwrap();
            match cli.command {
                Commands::Config(ConfigCommands::Set { key, value }) => {
                    assert_eq!(key, "levelExponent");
                    assert_eq!(value, "1.5");
                }
                _ => panic!("Expected Config Set command"),
            }

            let cli = Cli::try_parse_from(["studyquest", "config", "reset"]).unwrap();
            assert!(matches!(cli.command, Commands::Config(ConfigCommands::Reset)));
        }

        #[test]
        fn parse_tui_command() {
            let cli = Cli::try_parse_from(["studyquest", "tui"]).unwrap();
            assert!(matches!(cli.command, Commands::Tui));
        }

        #[test]
        fn parse_json_flag_global() {
            let cli1 = Cli::try_parse_from(["studyquest", "--json", "stats"]).unwrap();
            assert!(cli1.json);

            let cli2 = Cli::try_parse_from(["studyquest", "stats", "--json"]).unwrap();
            assert!(cli2.json);
        }

        #[test]
        fn parse_invalid_command_fails() {
            let result = Cli::try_parse_from(["studyquest", "invalid"]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_missing_required_arg_fails() {
            assert!(Cli::try_parse_from(["studyquest", "ingest"]).is_err());
            assert!(Cli::try_parse_from(["studyquest", "course"]).is_err());
            assert!(Cli::try_parse_from(["studyquest", "term"]).is_err());
            assert!(Cli::try_parse_from(["studyquest", "config", "set", "levelExponent"]).is_err());
        }

        #[test]
        fn parse_level_rejects_non_numeric() {
            assert!(Cli::try_parse_from(["studyquest", "level", "--completed", "lots"]).is_err());
        }
    }

    mod db_path_tests {
        use super::*;
        use std::env;

        // Both cases touch the same env var, so they run as one test.
        #[test]
        fn get_db_path_env_and_default() {
            let test_path = "/tmp/test_studyquest.db";
            env::set_var("STUDYQUEST_DB", test_path);
            let path = get_db_path();
            assert_eq!(path.to_str().unwrap(), test_path);

            env::remove_var("STUDYQUEST_DB");
            let path = get_db_path();
            let path_str = path.to_str().unwrap();
            assert!(path_str.ends_with("studyquest.db"));
            assert!(path_str.contains("studyquest"));
        }
    }
}

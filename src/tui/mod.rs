mod ui;
mod widgets;

use std::io;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::debug;

use crate::aggregate::{self, AggregateResult, Snapshot};
use crate::config::{self, Config};
use crate::db::Database;
use crate::models::CourseRecord;
use crate::progression::{LevelStatus, Progression};
use crate::store::CourseStore;

/// How often the dashboard re-reads storage.
const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Courses,
    CourseDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Courses,
            View::Courses => View::Dashboard,
            View::CourseDetail => View::Courses,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Courses,
            View::Courses => View::Dashboard,
            View::CourseDetail => View::Courses,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    db: Database,
    pub view: View,
    pub courses: StatefulList<CourseRecord>,
    pub selected_course: Option<CourseRecord>,
    pub config: Config,
    pub stats: AggregateResult,
    pub level: LevelStatus,
    pub xp_total: u64,
    pub filter: Option<String>,
    pub filter_input: String,
    pub filter_mode: bool,
    pub should_quit: bool,
    snapshot: Option<Snapshot>,
    last_refresh: Instant,
}

impl App {
    pub fn new(db: Database) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config::load(&db)?;
        let progression = Progression::new(config.program_credits, config.level_exponent);

        let mut app = Self {
            db,
            view: View::Dashboard,
            courses: StatefulList::with_items(Vec::new()),
            selected_course: None,
            stats: AggregateResult::default(),
            level: progression.status(0.0),
            xp_total: progression.xp_total,
            config,
            filter: None,
            filter_input: String::new(),
            filter_mode: false,
            should_quit: false,
            snapshot: None,
            last_refresh: Instant::now(),
        };
        app.refresh_data(true)?;
        Ok(app)
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Re-reads storage and re-aggregates when anything changed. `force`
    /// ignores the previous snapshot.
    pub fn refresh_data(&mut self, force: bool) -> Result<bool, Box<dyn std::error::Error>> {
        self.last_refresh = Instant::now();

        let config = config::load(&self.db)?;
        let courses = CourseStore::new(&self.db).get_all()?;
        let previous = if force { None } else { self.snapshot };
        let refresh = aggregate::refresh(&courses, &config, Self::today(), previous);
        self.snapshot = Some(refresh.snapshot);

        let Some(stats) = refresh.result else {
            return Ok(false);
        };
        debug!(courses = stats.course_count, credits = stats.total_credits, "dashboard refreshed");

        let progression = Progression::new(config.program_credits, config.level_exponent);
        self.level = progression.status(stats.total_credits);
        self.xp_total = progression.xp_total;
        self.stats = stats;
        self.config = config;

        let selected_id = self
            .courses
            .selected_item()
            .map(|c| c.course_id.clone());
        self.courses = StatefulList::with_items(self.filtered(courses.into_values().collect()));
        if let Some(id) = selected_id {
            if let Some(i) = self.courses.items.iter().position(|c| c.course_id == id) {
                self.courses.selected = Some(i);
            }
        }
        if let Some(id) = self.selected_course.as_ref().map(|c| c.course_id.clone()) {
            if let Some(updated) = self.courses.items.iter().find(|c| c.course_id == id) {
                self.selected_course = Some(updated.clone());
            }
        }
        Ok(true)
    }

    fn filtered(&self, courses: Vec<CourseRecord>) -> Vec<CourseRecord> {
        let Some(needle) = self.filter.as_deref().map(str::to_lowercase) else {
            return courses;
        };
        courses
            .into_iter()
            .filter(|c| {
                c.course_name.to_lowercase().contains(&needle)
                    || c
                        .course_code
                        .as_deref()
                        .is_some_and(|code| code.to_lowercase().contains(&needle))
            })
            .collect()
    }

    fn apply_filter(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.filter_input.is_empty() {
            self.filter = None;
        } else {
            self.filter = Some(self.filter_input.clone());
        }
        self.refresh_data(true)?;
        Ok(())
    }

    fn select_course(&mut self) {
        if let Some(course) = self.courses.selected_item() {
            self.selected_course = Some(course.clone());
            self.view = View::CourseDetail;
        }
    }

    fn tick(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.last_refresh.elapsed() >= REFRESH_INTERVAL {
            self.refresh_data(false)?;
        }
        Ok(())
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.filter_mode {
            match key {
                KeyCode::Esc => {
                    self.filter_mode = false;
                    self.filter_input.clear();
                }
                KeyCode::Enter => {
                    self.filter_mode = false;
                    self.apply_filter()?;
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                }
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                }
                _ => {}
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data(true)?;
            }

            KeyCode::Char('/') if self.view == View::Courses => {
                self.filter_mode = true;
                self.filter_input.clear();
            }

            KeyCode::Esc => match self.view {
                View::CourseDetail => {
                    self.view = View::Courses;
                    self.selected_course = None;
                }
                View::Courses if self.filter.is_some() => {
                    self.filter = None;
                    self.filter_input.clear();
                    self.apply_filter()?;
                }
                View::Courses | View::Dashboard => {}
            },

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::CourseDetail => {
                    self.view = View::Courses;
                    self.selected_course = None;
                }
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Courses => self.select_course(),
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down if self.view == View::Courses => self.courses.next(),
            KeyCode::Char('k') | KeyCode::Up if self.view == View::Courses => {
                self.courses.previous()
            }

            KeyCode::Char('g') if self.view == View::Courses && !self.courses.items.is_empty() => {
                self.courses.selected = Some(0);
            }
            KeyCode::Char('G') if self.view == View::Courses && !self.courses.items.is_empty() => {
                self.courses.selected = Some(self.courses.items.len() - 1);
            }

            KeyCode::Enter if self.view == View::Courses => self.select_course(),

            _ => {}
        }
        Ok(())
    }
}

pub fn run(db: Database) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = App::new(db).and_then(|mut app| run_app(&mut terminal, &mut app));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }

        app.tick()?;
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wumpus_core::{
    Action, Position,
    agent::PlanningAgent,
    environment::{ActionResult, Cell, Environment, EpisodeStatus},
    planner::{Planner, PlannerConfig},
    world::{SIMPLE_WORLD_JSON, WorldDescription, WorldInfo},
};

/// Upper bound on steps for a single episode.
const MAX_STEPS: usize = 10_000;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON world file to load (defaults to the built-in 7x7 world)
    #[arg(short, long, value_name = "WORLD_FILE", conflicts_with = "classic")]
    world: Option<PathBuf>,

    /// Generate a random square world of this size instead
    #[arg(short, long, value_name = "SIZE")]
    classic: Option<usize>,

    /// Seed for the random world
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Milliseconds between two steps of the animation
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Print the world, the plan and the episode result instead of opening the TUI
    #[arg(long)]
    headless: bool,

    /// Write logs to this file while the TUI is running
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Give up planning after this many expansions (unbounded by default)
    #[arg(long, value_name = "COUNT")]
    max_expansions: Option<usize>,

    /// Expand every search state, even ones already expanded
    #[arg(long)]
    no_prune: bool,
}

impl Args {
    fn planner(&self) -> Planner {
        Planner::default().with_config(PlannerConfig {
            prune_revisits: !self.no_prune,
            max_expansions: self.max_expansions,
        })
    }
}

struct App {
    /// The simulation being replayed.
    environment: Environment,
    agent: PlanningAgent,
    /// The last action taken and what came of it.
    last_step: Option<(Action, ActionResult)>,
    steps: usize,
    /// The agent has played out its plan.
    agent_done: bool,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(world: WorldInfo, planner: Planner) -> Self {
        App {
            environment: Environment::new(world),
            agent: PlanningAgent::new(planner),
            last_step: None,
            steps: 0,
            agent_done: false,
            should_quit: false,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if self.game_over() {
            return;
        }
        let Some(step) = self.environment.process_turn(&mut self.agent) else {
            info!("Plan finished without leaving the cave");
            self.agent_done = true;
            return;
        };
        info!(action = ?step.0, result = ?step.1, "Step");
        self.last_step = Some(step);
        self.steps += 1;
    }

    fn game_over(&self) -> bool {
        self.environment.status().is_over() || self.agent_done || self.steps >= MAX_STEPS
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_logging(&args)?;

    let world = load_world(&args)?;
    info!(world = world.id(), "World loaded");

    let planner = args.planner();
    if args.headless {
        return run_headless(world, planner);
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let mut app = App::new(world, planner);
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal state even if the loop failed
    restore_terminal(&mut terminal)?;
    result
}

/// Logs go to stderr in headless mode, to `--log-file` in TUI mode, and
/// nowhere otherwise so the screen stays clean. `RUST_LOG` sets the filter.
fn init_logging(args: &Args) -> Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("wumpus_tui=info,wumpus_core=info"))
    };

    if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(io::stderr)
            .init();
    } else if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }
    Ok(())
}

fn load_world(args: &Args) -> Result<WorldInfo> {
    if let Some(size) = args.classic {
        return WorldInfo::classic(size, args.seed).context("Failed to generate classic world");
    }
    match &args.world {
        Some(path) => read_world(path),
        None => WorldInfo::from_json(SIMPLE_WORLD_JSON).context("Built-in world is invalid"),
    }
}

fn read_world(path: &Path) -> Result<WorldInfo> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read world file {}", path.display()))?;
    WorldInfo::from_json(&json).with_context(|| format!("Failed to load world {}", path.display()))
}

/// Prints the world and the plan, then replays it without a terminal UI.
fn run_headless(world: WorldInfo, planner: Planner) -> Result<()> {
    println!("{}", WorldDescription::from(&world).to_json()?);

    let plan = planner.plan(&world);
    println!("Outcome: {:?}", plan.outcome);
    println!("Plan: {:?}", plan.actions);

    let mut environment = Environment::new(world);
    let report = environment.run_episode(&mut PlanningAgent::new(planner), MAX_STEPS);
    println!("Status: {:?}", report.status);
    println!("Score: {}", report.score);
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(65), // Area for the map
            Constraint::Percentage(30), // Status and plan
            Constraint::Percentage(5),  // Help
        ])
        .split(frame.area());

    let info_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_layout[1]);

    render_map(frame, main_layout[0], &app.environment);
    render_status(frame, info_layout[0], app);
    render_plan(frame, info_layout[1], &app.agent);

    let help_text = Paragraph::new("Press 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn facing_glyph(facing: wumpus_core::Direction) -> &'static str {
    match facing {
        wumpus_core::Direction::North => "^",
        wumpus_core::Direction::East => ">",
        wumpus_core::Direction::South => "v",
        wumpus_core::Direction::West => "<",
    }
}

/// Renders the world, northern row on top.
fn render_map(frame: &mut Frame, area: Rect, environment: &Environment) {
    let world = environment.world();
    let hunter = environment.hunter();
    let terrain = environment.terrain();
    let height = terrain.height();

    let lines: Vec<Line> = terrain
        .rows_north_first()
        .enumerate()
        .map(|(row, cells)| {
            let y = height - 1 - row;
            let spans: Vec<Span> = cells
                .iter()
                .enumerate()
                .flat_map(|(x, cell)| {
                    let position = Position { x, y };
                    let span = if position == hunter.position {
                        Span::styled(
                            facing_glyph(hunter.facing),
                            Style::default().fg(Color::Red).bold(),
                        )
                    } else if world.is_wumpus(position) {
                        if environment.wumpus_alive() {
                            Span::styled("W", Style::default().fg(Color::Magenta).bold())
                        } else {
                            Span::styled("w", Style::default().fg(Color::DarkGray))
                        }
                    } else if environment.gold_on_floor() && world.gold() == position {
                        Span::styled("g", Style::default().fg(Color::Yellow))
                    } else {
                        match cell {
                            Cell::Pit => Span::styled("O", Style::default().fg(Color::Blue)),
                            Cell::Block => Span::styled("#", Style::default().fg(Color::DarkGray)),
                            Cell::Floor if world.is_exit(position) => {
                                Span::styled("E", Style::default().fg(Color::Green))
                            }
                            Cell::Floor => Span::raw("."),
                        }
                    };
                    // Pad so the map keeps a square aspect.
                    [span, Span::raw(" ")]
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let title = world.id().unwrap_or("Wumpus World").to_string();
    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

/// Renders hunter state, percepts and the last step.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let environment = &app.environment;
    let hunter = environment.hunter();
    let percepts = environment.percepts();

    let status = match environment.status() {
        EpisodeStatus::Running if app.agent_done => "Plan over, still in the cave".to_string(),
        EpisodeStatus::Running if app.steps >= MAX_STEPS => "Step limit reached".to_string(),
        EpisodeStatus::Running => "Running".to_string(),
        EpisodeStatus::Dead(cause) => format!("Dead ({cause:?})"),
        EpisodeStatus::Exited { with_gold: true } => "Escaped with the gold".to_string(),
        EpisodeStatus::Exited { with_gold: false } => "Escaped empty handed".to_string(),
    };

    let mut sensed = Vec::new();
    if percepts.stench {
        sensed.push("stench");
    }
    if percepts.breeze {
        sensed.push("breeze");
    }
    if percepts.glitter {
        sensed.push("glitter");
    }

    let last = match &app.last_step {
        Some((action, result)) => format!("{action:?} -> {result:?}"),
        None => "-".to_string(),
    };

    let items = vec![
        ListItem::new(format!("Status: {status}")),
        ListItem::new(format!(
            "Pos: ({}, {}) facing {:?}",
            hunter.position.x, hunter.position.y, hunter.facing
        )),
        ListItem::new(format!(
            "Arrow: {}  Gold: {}",
            if hunter.has_arrow { "yes" } else { "no" },
            if hunter.has_gold { "yes" } else { "no" }
        )),
        ListItem::new(format!("Percepts: {}", sensed.join(", "))),
        ListItem::new(format!("Last: {last}")),
        ListItem::new(format!(
            "Steps: {}  Score: {}",
            app.steps,
            environment.score()
        )),
    ];

    let widget = List::new(items).block(Block::default().borders(Borders::ALL).title("Hunter"));
    frame.render_widget(widget, area);
}

/// Renders the planning outcome and the actions still queued.
fn render_plan(frame: &mut Frame, area: Rect, agent: &PlanningAgent) {
    let header = match agent.outcome() {
        Some(outcome) => format!("{outcome:?}"),
        None => "Not planned yet".to_string(),
    };
    let queued: Vec<String> = agent.remaining().map(|a| format!("{a:?}")).collect();

    let text = vec![
        Line::from(Span::styled(header, Style::default().bold())),
        Line::from(queued.join(" ")),
    ];
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Plan"));
    frame.render_widget(widget, area);
}

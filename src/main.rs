// ============================================================================
// LazyChart - Tableau de bord boursier en TUI
// ============================================================================
// Programme TUI : sélection de titre/intervalle/indicateurs, fetchs
// HTTP vers le backend de données, graphique en chandeliers avec volume
// et indicateurs en surimpression.
//
// ARCHITECTURE :
// - Event loop UI mono-thread (raw mode + alternate screen)
// - Worker thread avec runtime tokio pour les fetchs HTTP
// - Communication par channels mpsc (commandes / résultats)
// - Chaque commande transporte la génération de la sélection au moment
//   de l'émission ; l'App jette les résultats périmés
// ============================================================================

use std::io;
use std::sync::{mpsc, Arc, Mutex};

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info};

use lazychart::api::StockApi;
use lazychart::app::{App, DataRequest, InfoRequest};
use lazychart::config::Config;
use lazychart::models::{IndicatorMetadata, OhlcRow, StockInfo, StockListing};
use lazychart::ui::{events::EventHandler, render};

// ============================================================================
// AppCommand / AppResult : protocole du worker thread
// ============================================================================

/// Commandes envoyées au worker thread pour exécuter les fetchs
#[derive(Debug, Clone)]
enum AppCommand {
    /// Métadonnées des indicateurs (démarrage, avec backoff)
    FetchIndicators,

    /// Liste des titres d'une bourse (overlay de recherche)
    FetchStockList { exchange: String },

    /// Info du titre courant (intervalles supportés, plage de dates)
    FetchInfo(InfoRequest),

    /// Lignes OHLCV (fenêtre initiale ou lot d'historique)
    FetchData(DataRequest),
}

/// Résultats renvoyés par le worker thread
#[derive(Debug)]
enum AppResult {
    IndicatorsLoaded {
        metadata: Vec<IndicatorMetadata>,
    },

    /// Backend injoignable après épuisement du backoff de démarrage
    StartupFailed {
        error: String,
    },

    StockListLoaded {
        stocks: Vec<StockListing>,
    },

    StockListFailed {
        error: String,
    },

    InfoLoaded {
        generation: u64,
        info: StockInfo,
    },

    InfoFailed {
        generation: u64,
        error: String,
    },

    DataLoaded {
        generation: u64,
        prepend: bool,
        rows: Vec<OhlcRow>,
    },

    DataFailed {
        generation: u64,
        prepend: bool,
        error: String,
    },
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les println! ne fonctionnent pas une fois le TUI lancé : on log vers
// un fichier avec rotation quotidienne.
//
// # Utilisation
// ```bash
// tail -f ~/.local/share/lazychart/logs/lazychart.log
// RUST_LOG=lazychart=trace cargo run
// ```
// ============================================================================

fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = dirs::data_local_dir()
        .map(|dir| dir.join("lazychart").join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("./logs"));

    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "lazychart.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lazychart=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================

fn main() -> Result<()> {
    init_logging().unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: logging indisponible : {}", e);
    });

    let config = Config::from_env();
    info!(api = %config.api_base_url, "LazyChart starting up");

    let api = StockApi::new(&config).context("Échec de la création du client HTTP")?;

    let mut terminal = setup_terminal()?;

    let app = Arc::new(Mutex::new(App::new(&config)));

    let (command_tx, command_rx) = mpsc::channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker thread");
    spawn_background_worker(command_rx, result_tx, app.clone(), api);

    // Démarrage de la cascade : indicateurs d'abord, l'info du titre
    // par défaut part à la réception du résultat
    let _ = command_tx.send(AppCommand::FetchIndicators);

    let events = EventHandler::new();

    info!("Starting event loop");
    let result = run(&mut terminal, app.clone(), &events, command_tx, result_rx);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Background Worker Thread
// ============================================================================
// Thread séparé avec son runtime tokio : reçoit des AppCommand, exécute
// les fetchs (block_on bloque le worker, jamais l'UI), renvoie des
// AppResult. Les retries avec backoff vivent dans le client HTTP.
// ============================================================================

fn spawn_background_worker(
    command_rx: mpsc::Receiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
    app: Arc<Mutex<App>>,
    api: StockApi,
) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = ?e, "Impossible de créer le runtime tokio");
                let _ = result_tx.send(AppResult::StartupFailed {
                    error: "runtime indisponible".to_string(),
                });
                return;
            }
        };

        loop {
            let command = match command_rx.recv() {
                Ok(command) => command,
                Err(_) => {
                    info!("Worker thread exiting (channel closed)");
                    break;
                }
            };
            info!(?command, "Worker received command");

            match command {
                AppCommand::FetchIndicators => {
                    set_loading(&app, Some("Connexion au backend...".to_string()));
                    let result = runtime.block_on(api.available_indicators());
                    let message = match result {
                        Ok(metadata) => AppResult::IndicatorsLoaded { metadata },
                        Err(e) => {
                            error!(error = %e, "Backend injoignable au démarrage");
                            AppResult::StartupFailed {
                                error: e.user_message(),
                            }
                        }
                    };
                    let _ = result_tx.send(message);
                    clear_loading(&app);
                }

                AppCommand::FetchStockList { exchange } => {
                    let result = runtime.block_on(api.stock_list(&exchange));
                    let message = match result {
                        Ok(stocks) => AppResult::StockListLoaded { stocks },
                        Err(e) => AppResult::StockListFailed {
                            error: e.user_message(),
                        },
                    };
                    let _ = result_tx.send(message);
                }

                AppCommand::FetchInfo(request) => {
                    set_loading(&app, Some(format!("Info {}...", request.symbol)));
                    let result = runtime.block_on(api.stock_info(
                        &request.exchange,
                        &request.symbol,
                        request.interval,
                    ));
                    let message = match result {
                        Ok(info) => AppResult::InfoLoaded {
                            generation: request.generation,
                            info,
                        },
                        Err(e) => AppResult::InfoFailed {
                            generation: request.generation,
                            error: e.user_message(),
                        },
                    };
                    let _ = result_tx.send(message);
                    clear_loading(&app);
                }

                AppCommand::FetchData(request) => {
                    if !request.prepend {
                        set_loading(
                            &app,
                            Some(format!(
                                "Chargement {} ({})...",
                                request.symbol,
                                request.interval.label()
                            )),
                        );
                    }
                    let result = runtime.block_on(api.stock_data(
                        &request.exchange,
                        &request.symbol,
                        request.interval,
                        &request.start_date,
                        &request.end_date,
                        &request.requested_ids,
                        request.indicators.as_deref(),
                    ));
                    let message = match result {
                        Ok(rows) => AppResult::DataLoaded {
                            generation: request.generation,
                            prepend: request.prepend,
                            rows,
                        },
                        Err(e) => AppResult::DataFailed {
                            generation: request.generation,
                            prepend: request.prepend,
                            error: e.user_message(),
                        },
                    };
                    let _ = result_tx.send(message);
                    if !request.prepend {
                        clear_loading(&app);
                    }
                }
            }
        }
    });
}

/// Active l'indicateur de chargement (lock court)
fn set_loading(app: &Arc<Mutex<App>>, message: Option<String>) {
    if let Ok(mut app_lock) = app.lock() {
        app_lock.start_loading(message);
    }
}

fn clear_loading(app: &Arc<Mutex<App>>) {
    if let Ok(mut app_lock) = app.lock() {
        app_lock.stop_loading();
    }
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// Loop infinie : résultats du worker → render → input. Le lock sur App
// est pris par petites portées pour ne jamais bloquer le worker.
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: Arc<Mutex<App>>,
    events: &EventHandler,
    command_tx: mpsc::Sender<AppCommand>,
    result_rx: mpsc::Receiver<AppResult>,
) -> Result<()> {
    loop {
        {
            let app_lock = app.lock().map_err(|_| anyhow::anyhow!("lock empoisonné"))?;
            if !app_lock.is_running() {
                break;
            }
        }

        // 0. RÉSULTATS : traite les résultats du worker (non bloquant)
        match result_rx.try_recv() {
            Ok(result) => {
                let mut app_lock =
                    app.lock().map_err(|_| anyhow::anyhow!("lock empoisonné"))?;
                handle_result(&mut app_lock, result, &command_tx);
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                error!("Worker thread disconnected!");
            }
        }

        // 1. RENDER : dessine l'interface
        {
            let app_clone = app.clone();
            terminal.draw(|frame| {
                if let Ok(app_lock) = app_clone.lock() {
                    render(frame, &app_lock);
                }
            })?;
        }

        // 2. INPUT : traite les événements clavier
        if let Ok(event) = events.next() {
            let mut app_lock = app.lock().map_err(|_| anyhow::anyhow!("lock empoisonné"))?;
            handle_event(&mut app_lock, event, &command_tx);
        }
    }

    Ok(())
}

// ============================================================================
// Application des résultats du worker
// ============================================================================

/// Applique un résultat du worker à l'état de l'application
///
/// Les résultats datés (info, données) passent par les méthodes
/// apply_* de App qui jettent les générations périmées ; les suites de
/// cascade (info → data) sont émises ici.
fn handle_result(app: &mut App, result: AppResult, command_tx: &mpsc::Sender<AppCommand>) {
    match result {
        AppResult::IndicatorsLoaded { metadata } => {
            app.apply_indicators(metadata);
            // La cascade continue : info du titre par défaut
            let request = app.begin_info_fetch();
            let _ = command_tx.send(AppCommand::FetchInfo(request));
        }

        AppResult::StartupFailed { error } => {
            app.fail_startup(error);
        }

        AppResult::StockListLoaded { stocks } => {
            app.symbol_search.set_candidates(stocks);
        }

        AppResult::StockListFailed { error } => {
            app.symbol_search.set_error(error);
        }

        AppResult::InfoLoaded { generation, info } => {
            app.apply_stock_info(generation, info);
            // FetchingData : émet la requête de la fenêtre initiale
            if let Some(request) = app.data_request() {
                let _ = command_tx.send(AppCommand::FetchData(request));
            }
        }

        AppResult::InfoFailed { generation, error } => {
            app.apply_info_error(generation, error);
        }

        AppResult::DataLoaded {
            generation,
            prepend,
            rows,
        } => {
            app.apply_rows(generation, rows, prepend);
        }

        AppResult::DataFailed {
            generation,
            prepend,
            error,
        } => {
            app.apply_data_error(generation, error, prepend);
        }
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================

/// Traite un événement clavier et met à jour l'état de l'application
fn handle_event(app: &mut App, event: lazychart::ui::events::Event, command_tx: &mpsc::Sender<AppCommand>) {
    use lazychart::ui::events::{
        get_char_from_event, is_backspace_event, is_down_event, is_enter_event, is_escape_event,
        is_indicators_event, is_left_event, is_next_interval_event, is_older_history_event,
        is_previous_interval_event, is_quit_event, is_right_event, is_search_event,
        is_space_event, is_tab_event, is_text_char_event, is_up_event, Event,
    };

    match event {
        // ========================================
        // Global : quit two-step
        // ========================================
        Event::Key(_) if is_quit_event(&event) && app.is_on_chart() => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        // ========================================
        // Vue graphique
        // ========================================
        Event::Key(_) if is_search_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            app.open_symbol_search();
            app.symbol_search.start_loading();
            let _ = command_tx.send(AppCommand::FetchStockList {
                exchange: app.exchange.clone(),
            });
        }

        Event::Key(_) if is_indicators_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            app.open_indicators();
        }

        Event::Key(_) if is_next_interval_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            if app.next_interval() {
                let request = app.begin_info_fetch();
                let _ = command_tx.send(AppCommand::FetchInfo(request));
            }
        }

        Event::Key(_) if is_previous_interval_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            if app.previous_interval() {
                let request = app.begin_info_fetch();
                let _ = command_tx.send(AppCommand::FetchInfo(request));
            }
        }

        // Curseur du graphique
        Event::Key(_) if is_left_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            app.crosshair_move(-1);
        }
        Event::Key(_) if is_right_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            app.crosshair_move(1);
        }
        Event::Key(_) if is_escape_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            app.crosshair_hide();
        }

        // Historique plus ancien (scroll infini vers le passé) ; la
        // garde une-à-la-fois vit dans les canaux
        Event::Key(_) if is_older_history_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            if let Some(request) = app.request_older_history() {
                let _ = command_tx.send(AppCommand::FetchData(request));
            }
        }

        // ========================================
        // Overlay : recherche de symbole
        // ========================================
        Event::Key(_) if is_escape_event(&event) && app.is_on_symbol_search() => {
            app.show_chart();
        }

        Event::Key(_) if is_enter_event(&event) && app.is_on_symbol_search() => {
            if let Some(picked) = app.symbol_search.accept(&app.symbol, &app.exchange) {
                let exchange_changed = app.select_stock(picked);
                app.show_chart();
                let request = app.begin_info_fetch();
                let _ = command_tx.send(AppCommand::FetchInfo(request));
                if exchange_changed {
                    // La liste de candidats est scoped par bourse
                    let _ = command_tx.send(AppCommand::FetchStockList {
                        exchange: app.exchange.clone(),
                    });
                }
            } else {
                // Même titre ou liste vide : fermeture simple
                app.show_chart();
            }
        }

        Event::Key(_) if is_up_event(&event) && app.is_on_symbol_search() => {
            app.symbol_search.move_up();
        }
        Event::Key(_) if is_down_event(&event) && app.is_on_symbol_search() => {
            app.symbol_search.move_down();
        }
        Event::Key(_) if is_backspace_event(&event) && app.is_on_symbol_search() => {
            app.symbol_search.backspace();
        }
        Event::Key(_) if is_text_char_event(&event) && app.is_on_symbol_search() => {
            if let Some(c) = get_char_from_event(&event) {
                app.symbol_search.push_char(c);
            }
        }

        // ========================================
        // Overlay : indicateurs
        // ========================================
        Event::Key(_) if is_escape_event(&event) && app.is_on_indicators() => {
            if app.indicators.is_editing() {
                app.indicators.cancel_edit();
            } else {
                app.show_chart();
                // La sélection d'indicateurs a pu changer : re-fetch
                if let Some(request) = app.indicators_changed() {
                    let _ = command_tx.send(AppCommand::FetchData(request));
                }
            }
        }

        Event::Key(_) if is_space_event(&event) && app.is_on_indicators() => {
            app.indicators.toggle_highlighted();
        }

        Event::Key(_) if is_tab_event(&event) && app.is_on_indicators() => {
            app.indicators.edit_next_param();
        }

        Event::Key(_) if is_enter_event(&event) && app.is_on_indicators() => {
            if app.indicators.is_editing() {
                app.indicators.commit_edit();
            } else {
                app.show_chart();
                if let Some(request) = app.indicators_changed() {
                    let _ = command_tx.send(AppCommand::FetchData(request));
                }
            }
        }

        Event::Key(_) if is_up_event(&event) && app.is_on_indicators() => {
            app.indicators.move_up();
        }
        Event::Key(_) if is_down_event(&event) && app.is_on_indicators() => {
            app.indicators.move_down();
        }
        Event::Key(_) if is_backspace_event(&event) && app.is_on_indicators() => {
            app.indicators.backspace_edit();
        }
        Event::Key(_) if is_text_char_event(&event) && app.is_on_indicators() => {
            if let Some(c) = get_char_from_event(&event) {
                app.indicators.push_edit_char(c);
            }
        }

        Event::Tick => {}

        Event::Key(_) => {
            // Toute autre touche annule la confirmation de quit
            app.cancel_quit();
        }
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================
// Raw mode + alternate screen ; toujours restaurer le terminal avant de
// quitter, même en cas d'erreur.
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;

    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;

    terminal.show_cursor()?;

    Ok(())
}

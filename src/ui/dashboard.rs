// ============================================================================
// Dashboard - Rendu de l'interface principale
// ============================================================================
// Dessine l'interface TUI : en-tête avec la sélection courante, zone
// graphique, pied de page avec raccourcis ou message d'erreur, et les
// deux overlays modaux (recherche de symbole, indicateurs).
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, FetchState, Screen};
use crate::ui::chart;

// ============================================================================
// Fonction principale de rendu
// ============================================================================

/// Dessine l'interface complète
///
/// Le graphique est toujours dessiné en fond ; les overlays de
/// sélection se superposent selon l'écran actif.
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);
    chart::render_chart(frame, app, chunks[1]);
    render_footer(frame, app, chunks[2]);

    match app.current_screen() {
        Screen::Chart => {}
        Screen::SymbolSearch => render_symbol_search(frame, app),
        Screen::Indicators => render_indicators(frame, app),
    }
}

/// Crée le layout principal (header, graphique, footer)
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Graphique
            Constraint::Length(3), // Footer
        ])
        .split(area)
        .to_vec()
}

// ============================================================================
// Header : sélection courante et intervalles
// ============================================================================

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" LazyChart ")
        .title_alignment(Alignment::Center);

    let text = if app.is_connection_lost() {
        // Bannière persistante : backend injoignable, retries épuisés
        vec![Line::from(Span::styled(
            "⚠ Backend injoignable - relancez l'application une fois le serveur disponible ⚠",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))]
    } else if app.is_loading_data() {
        let message = app
            .loading_message
            .clone()
            .unwrap_or_else(|| "Chargement en cours...".to_string());
        vec![Line::from(vec![
            Span::styled("⏳ ", Style::default().fg(Color::Cyan)),
            Span::styled(
                message,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ])]
    } else {
        vec![selection_line(app)]
    };

    let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Ligne de sélection : titre courant + intervalles proposables
///
/// Seule l'intersection déclarée par le serveur est affichée, dans
/// l'ordre canonique ; placeholder explicite quand elle est vide.
fn selection_line(app: &App) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            app.chart_title(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
    ];

    if app.intervals.is_empty() {
        spans.push(Span::styled(
            "intervalles indisponibles",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        for interval in app.intervals.available() {
            let style = if *interval == app.interval {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(format!(" {} ", interval.code()), style));
            spans.push(Span::raw(" "));
        }
    }

    Line::from(spans)
}

// ============================================================================
// Footer : raccourcis, confirmation de quit, erreur inline
// ============================================================================

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let line = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez sur ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else if let Some(error) = app.error() {
        // Erreur réseau/données : message inline, l'affichage précédent
        // reste visible au-dessus
        Line::from(vec![
            Span::styled("✗ ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::styled(error.to_string(), Style::default().fg(Color::Red)),
        ])
    } else if app.fetch_state() == FetchState::FetchingInfo
        || app.fetch_state() == FetchState::FetchingData
    {
        Line::from(Span::styled(
            "Chargement...",
            Style::default().fg(Color::Cyan),
        ))
    } else {
        Line::from(vec![
            Span::styled("[q]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Quit  "),
            Span::styled("[s]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Symbole  "),
            Span::styled("[i]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Indicateurs  "),
            Span::styled("[ [ ] ]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Intervalle  "),
            Span::styled("[h l]", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Curseur  "),
            Span::styled("[o]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Historique"),
        ])
    };

    let paragraph = Paragraph::new(vec![line])
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Overlay : recherche de symbole
// ============================================================================

fn render_symbol_search(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 70, frame.size());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" Recherche de symbole ");

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Ligne de saisie
            Constraint::Min(0),    // Candidats
            Constraint::Length(1), // Aide
        ])
        .split(block.inner(area))
        .to_vec();

    frame.render_widget(block, area);

    // Ligne de saisie du filtre
    let input = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled(app.symbol_search.query().to_string(), Style::default().fg(Color::White)),
        Span::styled(
            "█",
            Style::default().fg(Color::White).add_modifier(Modifier::SLOW_BLINK),
        ),
    ]);
    frame.render_widget(Paragraph::new(vec![input]), chunks[0]);

    // Liste des candidats (ou état explicite)
    if app.symbol_search.is_loading() {
        let text = Paragraph::new("Chargement de la liste...")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        frame.render_widget(text, chunks[1]);
    } else if let Some(error) = app.symbol_search.error() {
        let text = Paragraph::new(error.to_string())
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        frame.render_widget(text, chunks[1]);
    } else {
        let filtered = app.symbol_search.filtered();
        if filtered.is_empty() {
            let text = Paragraph::new("Aucune action trouvée")
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center);
            frame.render_widget(text, chunks[1]);
        } else {
            // Fenêtre de défilement autour du curseur
            let visible = chunks[1].height as usize;
            let cursor = app.symbol_search.cursor();
            let skip = cursor.saturating_sub(visible.saturating_sub(1));

            let items: Vec<ListItem> = filtered
                .iter()
                .enumerate()
                .skip(skip)
                .take(visible)
                .map(|(index, stock)| {
                    let mut style = Style::default().fg(Color::White);
                    if stock.symbol == app.symbol && stock.exchange == app.exchange {
                        style = style.fg(Color::Green);
                    }
                    if index == cursor {
                        style = style.add_modifier(Modifier::BOLD).add_modifier(Modifier::REVERSED);
                    }
                    ListItem::new(format!(" {} [{}]", stock.label(), stock.exchange)).style(style)
                })
                .collect();
            frame.render_widget(List::new(items), chunks[1]);
        }
    }

    let help = Line::from(vec![
        Span::styled("[↑↓]", Style::default().fg(Color::Yellow)),
        Span::raw(" Naviguer  "),
        Span::styled("[Enter]", Style::default().fg(Color::Green)),
        Span::raw(" Choisir  "),
        Span::styled("[ESC]", Style::default().fg(Color::Red)),
        Span::raw(" Fermer"),
    ]);
    frame.render_widget(Paragraph::new(vec![help]).alignment(Alignment::Center), chunks[2]);
}

// ============================================================================
// Overlay : sélecteur d'indicateurs
// ============================================================================

fn render_indicators(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 60, frame.size());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" Indicateurs techniques ");

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Liste
            Constraint::Length(1), // Édition de paramètre
            Constraint::Length(1), // Aide
        ])
        .split(block.inner(area))
        .to_vec();

    frame.render_widget(block, area);

    if app.indicators.is_empty() {
        let text = Paragraph::new("Aucun indicateur disponible")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        frame.render_widget(text, chunks[0]);
    } else {
        let items: Vec<ListItem> = app
            .indicators
            .metadata()
            .iter()
            .enumerate()
            .map(|(index, meta)| {
                let selection = app.indicators.selection(&meta.id);
                let enabled = selection.map(|s| s.enabled).unwrap_or(false);

                let mut style = if !meta.is_usable() {
                    // Métadonnées malformées : grisé, non activable
                    Style::default().fg(Color::DarkGray)
                } else if enabled {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::White)
                };
                if index == app.indicators.cursor() {
                    style = style.add_modifier(Modifier::BOLD).add_modifier(Modifier::REVERSED);
                }

                let checkbox = if enabled { "[x]" } else { "[ ]" };
                let params = selection
                    .map(|s| {
                        s.params
                            .iter()
                            .map(|p| format!("{}={}", p.name, p.value))
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default();
                ListItem::new(format!(" {} {}  {}", checkbox, meta.name, params)).style(style)
            })
            .collect();
        frame.render_widget(List::new(items), chunks[0]);
    }

    // Ligne d'édition du paramètre en cours
    let edit_line = match (app.indicators.editing_param(), app.indicators.edit_buffer()) {
        (Some((_, name)), Some(buffer)) => Line::from(vec![
            Span::styled(
                format!("{} = ", name),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(buffer.to_string(), Style::default().fg(Color::White)),
            Span::styled(
                "█",
                Style::default().fg(Color::White).add_modifier(Modifier::SLOW_BLINK),
            ),
        ]),
        _ => Line::from(""),
    };
    frame.render_widget(Paragraph::new(vec![edit_line]), chunks[1]);

    let help = Line::from(vec![
        Span::styled("[Espace]", Style::default().fg(Color::Yellow)),
        Span::raw(" Activer  "),
        Span::styled("[Tab]", Style::default().fg(Color::Yellow)),
        Span::raw(" Paramètre  "),
        Span::styled("[Enter]", Style::default().fg(Color::Green)),
        Span::raw(" Valider  "),
        Span::styled("[ESC]", Style::default().fg(Color::Red)),
        Span::raw(" Fermer"),
    ]);
    frame.render_widget(Paragraph::new(vec![help]).alignment(Alignment::Center), chunks[2]);
}

// ============================================================================
// Helper : rectangle centré pour les overlays
// ============================================================================

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

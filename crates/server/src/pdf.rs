//! Printable ticket export.
//!
//! The document is first laid out as a list of [`PdfLine`]s, then drawn
//! onto A4 pages with the built-in Helvetica faces.

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use thiserror::Error;

use belgrano_tickets_core::Money;

use crate::models::Ticket;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 6.0;

/// PDF generation errors.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF rendering failed: {0}")]
    Render(#[from] printpdf::Error),
}

/// Text weight and size of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Subtitle,
    Heading,
    Body,
    Strong,
    Footer,
}

impl LineStyle {
    const fn size(self) -> f32 {
        match self {
            Self::Title => 20.0,
            Self::Subtitle | Self::Heading => 13.0,
            Self::Body | Self::Strong => 10.0,
            Self::Footer => 8.0,
        }
    }

    const fn bold(self) -> bool {
        matches!(self, Self::Title | Self::Heading | Self::Strong)
    }
}

/// One laid-out line of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLine {
    pub style: LineStyle,
    pub text: String,
}

impl PdfLine {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

fn date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// Lay out a ticket.
#[must_use]
pub fn ticket_lines(ticket: &Ticket, generated_at: DateTime<Utc>) -> Vec<PdfLine> {
    use LineStyle::{Body, Footer, Heading, Strong, Subtitle, Title};

    let mut lines = vec![
        PdfLine::new(Title, "BELGRANO AHORRO"),
        PdfLine::new(Subtitle, "Ticket de Pedido"),
        PdfLine::new(Body, ""),
        PdfLine::new(Heading, "Detalles del ticket"),
        PdfLine::new(Body, format!("Número: {}", ticket.numero)),
        PdfLine::new(Body, format!("Fecha: {}", date(ticket.fecha_creacion))),
        PdfLine::new(
            Body,
            format!("Estado: {}", ticket.estado.as_str().to_uppercase()),
        ),
        PdfLine::new(
            Body,
            format!("Prioridad: {}", ticket.prioridad.as_str().to_uppercase()),
        ),
        PdfLine::new(
            Body,
            format!(
                "Repartidor: {}",
                ticket.repartidor_nombre.as_deref().unwrap_or("Sin asignar")
            ),
        ),
    ];
    if let Some(at) = ticket.fecha_asignacion {
        lines.push(PdfLine::new(Body, format!("Asignado: {}", date(at))));
    }

    lines.extend([
        PdfLine::new(Body, ""),
        PdfLine::new(Heading, "Cliente"),
        PdfLine::new(Body, format!("Nombre: {}", ticket.cliente_nombre)),
        PdfLine::new(Body, format!("Dirección: {}", ticket.cliente_direccion)),
        PdfLine::new(Body, format!("Teléfono: {}", ticket.cliente_telefono)),
        PdfLine::new(Body, format!("Email: {}", ticket.cliente_email)),
        PdfLine::new(Body, ""),
        PdfLine::new(Heading, "Productos"),
        PdfLine::new(Strong, "#  Producto  x  Cantidad  Precio  Subtotal"),
    ]);

    for (n, line) in ticket.productos.iter().enumerate() {
        lines.push(PdfLine::new(
            Body,
            format!(
                "{}. {}  x{}  {}  {}",
                n + 1,
                line.nombre,
                line.cantidad,
                line.precio.format_ars(),
                line.subtotal().format_ars()
            ),
        ));
    }

    let total = if ticket.total > Money::ZERO {
        ticket.total
    } else {
        ticket.products_total()
    };
    lines.push(PdfLine::new(Strong, format!("TOTAL: {}", total.format_ars())));

    if !ticket.indicaciones.trim().is_empty() {
        lines.push(PdfLine::new(Body, ""));
        lines.push(PdfLine::new(Heading, "Indicaciones"));
        lines.extend(
            ticket
                .indicaciones
                .lines()
                .map(|l| PdfLine::new(Body, l.to_string())),
        );
    }

    lines.push(PdfLine::new(Body, ""));
    lines.push(PdfLine::new(
        Footer,
        format!("Documento generado el {}", date(generated_at)),
    ));
    lines
}

/// Render a ticket as PDF bytes.
///
/// # Errors
///
/// Returns `PdfError::Render` if fonts cannot be embedded or the document
/// cannot be serialized.
pub fn render_ticket(ticket: &Ticket, generated_at: DateTime<Utc>) -> Result<Vec<u8>, PdfError> {
    let title = format!("Ticket {}", ticket.numero);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Ticket");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut current: PdfLayerReference = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in ticket_lines(ticket, generated_at) {
        if y < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Ticket");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - MARGIN;
        }
        let font: &IndirectFontRef = if line.style.bold() { &bold } else { &regular };
        if !line.text.is_empty() {
            current.use_text(&line.text, line.style.size(), Mm(MARGIN), Mm(y), font);
        }
        y -= LINE_HEIGHT.max(line.style.size() * 0.5);
    }

    Ok(doc.save_to_bytes()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{ProductLine, Quantity};
    use belgrano_tickets_core::{Priority, TicketId, TicketStatus};
    use chrono::TimeZone;

    fn ticket() -> Ticket {
        Ticket {
            id: TicketId::new(7),
            numero: "PED-1001".to_string(),
            cliente_nombre: "Ana Pérez".to_string(),
            cliente_direccion: "Belgrano 123".to_string(),
            cliente_telefono: "11-5555-0000".to_string(),
            cliente_email: "ana@example.com".to_string(),
            productos: vec![ProductLine {
                nombre: "Yerba".to_string(),
                cantidad: Quantity::from(2_u32),
                precio: "1500.25".parse().unwrap(),
                extra: serde_json::Map::new(),
            }],
            total: Money::ZERO,
            estado: TicketStatus::EnProceso,
            prioridad: Priority::Alta,
            indicaciones: "Tocar timbre".to_string(),
            asignado_a: None,
            repartidor_nombre: None,
            fecha_creacion: Utc.with_ymd_and_hms(2025, 1, 2, 15, 4, 0).unwrap(),
            fecha_asignacion: None,
            fecha_entrega: None,
            notas_repartidor: String::new(),
        }
    }

    fn texts(lines: &[PdfLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_layout_contents() {
        let at = Utc.with_ymd_and_hms(2025, 1, 3, 8, 0, 0).unwrap();
        let lines = ticket_lines(&ticket(), at);
        let texts = texts(&lines);

        assert_eq!(lines[0].style, LineStyle::Title);
        assert!(texts.contains(&"Fecha: 02/01/2025 15:04"));
        assert!(texts.contains(&"Estado: EN_PROCESO"));
        assert!(texts.contains(&"Prioridad: ALTA"));
        assert!(texts.contains(&"Repartidor: Sin asignar"));
        // Total falls back to the product sum when unset.
        assert!(texts.contains(&"TOTAL: $3.000,50"));
        assert!(texts.contains(&"Tocar timbre"));
        assert_eq!(
            texts.last().copied(),
            Some("Documento generado el 03/01/2025 08:00")
        );
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_ticket(&ticket(), Utc::now()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}

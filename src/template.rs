use chrono::{DateTime, TimeZone};

pub const DEFAULT_TEMPLATE: &str =
    "Olá {{nome}}, seu atendimento está agendado para {{data}} às {{hora}}.";

const NAME_PLACEHOLDER: &str = "{{nome}}";
const DATE_PLACEHOLDER: &str = "{{data}}";
const TIME_PLACEHOLDER: &str = "{{hora}}";

/// Renders a reminder message. A missing or empty template falls back to
/// [`DEFAULT_TEMPLATE`]. Each placeholder is replaced at its first
/// occurrence only.
pub fn render_reminder(template: Option<&str>, name: &str, date: &str, time: &str) -> String {
    let template = match template {
        Some(t) if !t.is_empty() => t,
        _ => DEFAULT_TEMPLATE,
    };

    template
        .replacen(NAME_PLACEHOLDER, name, 1)
        .replacen(DATE_PLACEHOLDER, date, 1)
        .replacen(TIME_PLACEHOLDER, time, 1)
}

/// `dd/mm/yyyy` in the given timezone.
pub fn format_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%d/%m/%Y").to_string()
}

/// `HH:MM`, 24-hour, zero padded.
pub fn format_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::America::Sao_Paulo;

    #[test]
    fn substitutes_all_placeholders() {
        let out = render_reminder(
            Some("Olá {{nome}}, ... {{data}} ... {{hora}}."),
            "Ana",
            "05/03/2025",
            "14:30",
        );
        assert_eq!(out, "Olá Ana, ... 05/03/2025 ... 14:30.");
        assert!(!out.contains("{{"));
    }

    #[test]
    fn default_template_applies_when_missing_or_empty() {
        let expected = "Olá Ana, seu atendimento está agendado para 05/03/2025 às 14:30.";
        assert_eq!(render_reminder(None, "Ana", "05/03/2025", "14:30"), expected);
        assert_eq!(render_reminder(Some(""), "Ana", "05/03/2025", "14:30"), expected);
    }

    #[test]
    fn only_first_occurrence_is_replaced() {
        let out = render_reminder(Some("{{nome}} {{nome}} {{hora}}"), "Ana", "x", "09:00");
        assert_eq!(out, "Ana {{nome}} 09:00");
    }

    #[test]
    fn substitution_runs_in_placeholder_order() {
        let out = render_reminder(Some("{{nome}} em {{data}}"), "{{data}}", "01/01/2025", "");
        assert_eq!(out, "01/01/2025 em {{data}}");
    }

    #[test]
    fn formats_in_local_time_zero_padded() {
        // 2025-03-05 12:05 UTC is 09:05 in São Paulo (UTC-3).
        let at = Utc.with_ymd_and_hms(2025, 3, 5, 12, 5, 0).unwrap();
        let local = at.with_timezone(&Sao_Paulo);
        assert_eq!(format_date(&local), "05/03/2025");
        assert_eq!(format_time(&local), "09:05");
    }

    #[test]
    fn local_date_can_differ_from_utc_date() {
        let at = Utc.with_ymd_and_hms(2025, 3, 6, 1, 30, 0).unwrap();
        let local = at.with_timezone(&Sao_Paulo);
        assert_eq!(format_date(&local), "05/03/2025");
        assert_eq!(format_time(&local), "22:30");
    }
}

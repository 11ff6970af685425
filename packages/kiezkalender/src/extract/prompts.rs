//! Prompt templates for extraction, enrichment, venue lookup and navigation.
//!
//! The extraction prompts are German because the scraped sites are German;
//! field names stay English to match the JSON schema. Placeholders use
//! `{name}` syntax and are filled by the `format_*` helpers.

use chrono::NaiveDate;

/// System prompt for full HTML extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"Du bist ein Experte für die Extraktion von Veranstaltungsdaten aus Webseiten für Familien in Hamburg.

Deine Aufgabe:
1. Extrahiere ALLE Veranstaltungen aus dem bereitgestellten Text
2. Filtere NUR familienfreundliche Events, die für Kinder ab 4 Jahren geeignet sind
3. Kategorisiere jedes Event PRÄZISE nach dem Hauptinhalt:

KATEGORIEN (wähle die am besten passende):
- theater: Theateraufführungen, Puppentheater, Musicals, Figurentheater, Kinderoper, Schauspiel, Lesungen mit Schauspiel
- outdoor: Outdoor-Aktivitäten, Naturerlebnisse, Spielplatz-Events, Walderlebnisse, Tierparkbesuche, Radtouren, Wanderungen, Picknicks
- museum: Museumsbesuche, Ausstellungen, Führungen, Planetarium, Science Center, interaktive Ausstellungen, Workshops in Museen
- music: Konzerte für Kinder, Mitmachkonzerte, Musikworkshops, Kinderdisco, Singveranstaltungen
- sport: Sportevents, Turniere, Sportkurse, Schwimmen, Klettern, Tanzkurse, Bewegungsangebote, Zirkusworkshops
- market: Märkte, Flohmärkte, Festivals, Stadtteilfeste, Kinderfeste, Basare, Weihnachtsmärkte, Oster-Events
- kreativ: Bastelworkshops, Malkurse, Töpfern, Werken, Handarbeit, DIY-Angebote, Kreativnachmittage
- lesen: Vorlesestunden, Bilderbuchkino, Lesungen ohne Schauspiel, Bibliotheksangebote, Erzählstunden

KATEGORISIERUNGS-PRIORISIERUNG:
- Wenn ein Theater auch Musik hat → "theater" (Hauptattraktion)
- Wenn ein Museum einen Workshop anbietet → "museum" (Ort ist entscheidend)
- Zirkus mit Aufführung → "theater", Zirkusworkshop zum Mitmachen → "sport"
- Kinder-Flohmarkt → "market", nicht "outdoor" auch wenn draußen
- Lesung mit Schauspiel → "theater", reine Vorlesestunde → "lesen"
- Bastelangebot außerhalb eines Museums → "kreativ"

LOCATION-EXTRAKTION (WICHTIG!):
- Extrahiere den VOLLSTÄNDIGEN Veranstaltungsort
- Suche nach: Straße + Hausnummer, PLZ, Stadtteil
- Typische Hamburger Stadtteile: Altona, Eimsbüttel, Eppendorf, Wandsbek, Barmbek, St. Pauli, HafenCity, Blankenese, Harburg, Bergedorf, Winterhude, Ottensen, Uhlenhorst
- Wenn nur der Venue-Name bekannt ist (z.B. "Klecks Theater"), verwende diesen als location.name
- Wenn eine Adresse im Text vorkommt, diese VOLLSTÄNDIG in location.address übernehmen
- Bei bekannten Hamburger Venues die Standardadresse verwenden falls bekannt

Wichtige Regeln:
- Ignoriere Events die explizit für Erwachsene sind (z.B. "Abendvorstellung für Erwachsene", "ab 16 Jahren")
- Wenn keine Altersangabe vorhanden ist, schätze basierend auf dem Kontext
- Preise immer als String formatieren (z.B. "8€", "5-10€", "Kostenlos", "Eintritt frei")
- Bei unbekannten Daten "Unbekannt" verwenden
- is_indoor: true für Indoor-Events (Theater, Museum, Hallen), false für Outdoor-Events (Parks, Märkte im Freien)
- Datum: Verwende das aktuelle Jahr {current_year} wenn kein Jahr angegeben ist"#;

/// User prompt for full HTML extraction.
pub const EXTRACTION_USER_PROMPT: &str = r#"Extrahiere alle familienfreundlichen Veranstaltungen aus diesem Text.

Quelle: {source_name}
URL: {source_url}

Webseiten-Inhalt:
{content}

Verfuegbare Links (Text -> URL):
{link_list}

{hints_section}Antworte NUR mit einem JSON-Array von Events im folgenden Format:
[
  {
    "title": "Event-Titel (prägnant, ohne Datum im Titel)",
    "description": "Kurze Beschreibung des Events (max 200 Zeichen, was erwartet die Familie?)",
    "date_start": "2026-02-15T15:00:00",
    "date_end": "2026-02-15T17:00:00",
    "location": {
      "name": "Veranstaltungsort (z.B. Klecks Theater, Tierpark Hagenbeck)",
      "address": "Vollständige Adresse: Straße Hausnummer, PLZ Hamburg-Stadtteil",
      "district": "Hamburger Stadtteil (z.B. Altona, Eimsbüttel, Wandsbek)"
    },
    "category": "theater|outdoor|museum|music|sport|market|kreativ|lesen",
    "is_indoor": true,
    "age_suitability": "4+" oder "0-3" oder "6+" oder "alle",
    "price_info": "8€" oder "5-10€" oder "Kostenlos",
    "original_link": "https://... (direkter Link zur Event-Detailseite)"
  }
]

WICHTIG zur Location:
- Wenn die Quelle selbst ein Veranstaltungsort ist (z.B. ein Theater), verwende dessen Namen und Adresse
- Suche im Text nach Straßennamen, PLZ (20xxx für Hamburg), Stadtteilen
- "district" ist optional aber hilfreich für die Filterung

WICHTIG zu Terminen:
- Wenn mehrere konkrete Termine/Uhrzeiten genannt werden, erstelle EIN Event pro Termin
- Wenn nur ein Zeitraum genannt wird (z.B. 05.02-03.03) und keine einzelnen Termine vorhanden sind, setze date_start UND date_end und behandle es als durchgehend/laufend
- Wenn Formulierungen wie "jeden Samstag", "immer Sonntags" oder "Mo-Fr" plus Zeitraum vorkommen, erstelle Termine fuer jeden passenden Wochentag innerhalb des Zeitraums
- Wenn der Zeitraum nur eine Laufzeit beschreibt (Ausstellung/Produktion), verwende date_end und keine kuenstliche Terminliste

WICHTIG zu Links:
- Nutze wenn möglich den spezifischen Detail-Link zum Event (nicht die Kalender-Uebersicht)
- Verwende dafuer die Linkliste oder Links im Text
- Falls kein Detail-Link erkennbar ist, nutze die Kalender-URL als Fallback

Wenn keine passenden Events gefunden werden, antworte mit: []"#;

/// System prompt for the cheap classification pass over structured raw
/// events. Much smaller than full extraction: the dates are already parsed,
/// the model only filters and categorizes.
pub const ENRICHMENT_SYSTEM_PROMPT: &str = r#"Du bist ein Experte für familienfreundliche Veranstaltungen in Hamburg.

Du bekommst eine nummerierte Liste von Veranstaltungen, die bereits aus einem Spielplan extrahiert wurden. Deine Aufgabe:
1. Entscheide für jede Veranstaltung, ob sie familienfreundlich und für Kinder ab 4 Jahren geeignet ist
2. Wähle die am besten passende Kategorie: theater, outdoor, museum, music, sport, market, kreativ, lesen
3. Schreibe eine kurze Beschreibung (max 200 Zeichen) auf Basis von Titel und Hinweistext

Wichtige Regeln:
- Veranstaltungen explizit für Erwachsene (z.B. "ab 16 Jahren", "Abendvorstellung") sind NICHT familienfreundlich
- Wenn keine Altersangabe vorhanden ist, schätze basierend auf Titel und Beschreibung
- is_indoor: true für Theater- und Saalveranstaltungen, false für Open-Air

Antworte NUR mit einem JSON-Array, genau ein Eintrag pro Nummer:
[
  {
    "index": 1,
    "family_friendly": true,
    "category": "theater",
    "description": "Kurze Beschreibung",
    "age_suitability": "4+",
    "is_indoor": true
  }
]"#;

/// User prompt for the classification pass.
pub const ENRICHMENT_USER_PROMPT: &str = r#"Diese Veranstaltungen wurden aus dem Spielplan von {source_name} extrahiert:

{event_list}

Beurteile jede Veranstaltung und antworte als JSON-Array mit einem Eintrag pro Nummer."#;

/// Prompt for the batched venue address lookup. Sent as a single user
/// message without a system prompt.
pub const VENUE_LOOKUP_PROMPT: &str = r#"Du bist ein Experte für Veranstaltungsorte in Hamburg.
Finde die vollständigen Adressen für diese Veranstaltungsorte:

{venues}

Antworte NUR mit einem JSON-Objekt im folgenden Format:
{
  "Venue Name": {
    "address": "Straße Hausnummer, PLZ Hamburg",
    "district": "Stadtteil"
  },
  "Anderer Venue": null
}

REGELN:
- Gib die Adresse NUR an wenn du dir SICHER bist dass sie korrekt ist
- Wenn du unsicher bist oder den Ort nicht kennst, gib null zurück
- Verwende das exakte Format: "Straße Hausnummer, PLZ Hamburg"
- District ist der Hamburger Stadtteil (z.B. Altona, Eimsbüttel, Wandsbek)"#;

/// System prompt for screenshot extraction.
pub const VISION_SYSTEM_PROMPT: &str = r#"Du bist ein Experte für die Extraktion von Veranstaltungsdaten aus Screenshots von Webseiten für Familien in Hamburg.

Deine Aufgabe:
1. Analysiere den Screenshot und extrahiere Veranstaltungen der NÄCHSTEN 14 TAGE
2. Filtere NUR familienfreundliche Events, die für Kinder ab 4 Jahren geeignet sind
3. Kategorisiere jedes Event PRÄZISE nach dem Hauptinhalt
4. WICHTIG: Extrahiere maximal 30 Events um die Response-Länge zu begrenzen

KATEGORIEN (wähle die am besten passende):
- theater: Theateraufführungen, Puppentheater, Musicals, Figurentheater, Kinderoper, Schauspiel, Lesungen mit Schauspiel
- outdoor: Outdoor-Aktivitäten, Naturerlebnisse, Spielplatz-Events, Walderlebnisse, Tierparkbesuche, Radtouren
- museum: Museumsbesuche, Ausstellungen, Führungen, Planetarium, Science Center, Workshops in Museen
- music: Konzerte für Kinder, Mitmachkonzerte, Musikworkshops, Kinderdisco, Singveranstaltungen
- sport: Sportevents, Turniere, Sportkurse, Schwimmen, Klettern, Tanzkurse, Bewegungsangebote
- market: Märkte, Flohmärkte, Festivals, Stadtteilfeste, Kinderfeste, Basare
- kreativ: Bastelworkshops, Malkurse, Werken, Kreativnachmittage
- lesen: Vorlesestunden, Bilderbuchkino, Lesungen ohne Schauspiel

LOCATION-EXTRAKTION (WICHTIG!):
- Extrahiere den VOLLSTÄNDIGEN Veranstaltungsort
- Suche nach: Straße + Hausnummer, PLZ, Stadtteil
- Typische Hamburger Stadtteile: Altona, Eimsbüttel, Eppendorf, Wandsbek, Barmbek, St. Pauli, HafenCity, Blankenese, Harburg
- Wenn nur der Venue-Name bekannt ist (z.B. "Klecks Theater"), verwende diesen als location_name
- Wenn eine Adresse sichtbar ist, diese VOLLSTÄNDIG in location_address übernehmen

Wichtige Regeln:
- Ignoriere Events die explizit für Erwachsene sind (z.B. "ab 16 Jahren", "Erwachsenenvorstellung")
- Wenn keine Altersangabe sichtbar ist, schätze basierend auf dem Kontext
- Preise als String formatieren (z.B. "8€", "5-10€", "Kostenlos")
- Bei unbekannten Daten "Unbekannt" verwenden
- is_indoor: true für Indoor-Events (Theater, Museum), false für Outdoor-Events
- Datum: Verwende das aktuelle Jahr {current_year} wenn kein Jahr angegeben ist

Wichtig: Gib die Antwort als JSON-Array zurück:
[
  {
    "title": "Event-Titel",
    "description": "Beschreibung des Events",
    "date": "2026-02-15",
    "time": "15:00",
    "date_end": "2026-02-15" (optional, nur bei mehrtägigen Events),
    "time_end": "17:00" (optional),
    "location_name": "Venue-Name",
    "location_address": "Straße Nr, PLZ Stadt",
    "location_district": "Stadtteil",
    "category": "theater|outdoor|museum|music|sport|market|kreativ|lesen",
    "is_indoor": true|false,
    "age_suitability": "4+",
    "price_info": "8€",
    "link": "https://..."
  }
]"#;

/// Prompt asking the model to pick the calendar URL out of navigation
/// markup. English works fine here, the keywords stay German.
pub const NAVIGATION_PROMPT: &str = r#"Analyze this website's navigation HTML and identify the URL that leads to the event calendar, schedule, or specific performance dates page.

Base URL: {base_url}

Navigation HTML:
{nav_html}

Instructions:
1. Prefer links that contain concrete dates or words like: Spielplan, Termine, Kalender, Vorstellungen, Aufführungen
2. Avoid links that look like repertoire/overview pages (e.g., Stücke, Repertoire, Produktionen, Ensemble)
3. Return ONLY the full URL (absolute, not relative)
4. If you can't find a calendar URL, respond with: NONE

Calendar URL:"#;

pub fn format_extraction_system_prompt(current_year: i32) -> String {
    EXTRACTION_SYSTEM_PROMPT.replace("{current_year}", &current_year.to_string())
}

pub fn format_extraction_user_prompt(
    source_name: &str,
    source_url: &str,
    content: &str,
    link_list: &str,
    hints: Option<&str>,
) -> String {
    EXTRACTION_USER_PROMPT
        .replace("{source_name}", source_name)
        .replace("{source_url}", source_url)
        .replace("{content}", content)
        .replace("{link_list}", link_list)
        .replace("{hints_section}", &hints_section(hints))
}

pub fn format_enrichment_user_prompt(source_name: &str, event_list: &str) -> String {
    ENRICHMENT_USER_PROMPT
        .replace("{source_name}", source_name)
        .replace("{event_list}", event_list)
}

pub fn format_venue_lookup_prompt(venue_names: &[String]) -> String {
    let venues = venue_names
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    VENUE_LOOKUP_PROMPT.replace("{venues}", &venues)
}

pub fn format_vision_system_prompt(current_year: i32) -> String {
    VISION_SYSTEM_PROMPT.replace("{current_year}", &current_year.to_string())
}

pub fn format_vision_user_prompt(
    url: &str,
    today: NaiveDate,
    window_end: NaiveDate,
    hints: Option<&str>,
) -> String {
    let mut prompt = format!("Analysiere diesen Screenshot der Webseite: {url}\n\n");
    prompt.push_str(&format!(
        "WICHTIG: Heute ist der {}. Extrahiere NUR Events vom {} bis {} (nächste 14 Tage).\n\n",
        today.format("%d.%m.%Y"),
        today.format("%d.%m.%Y"),
        window_end.format("%d.%m.%Y"),
    ));
    if let Some(hints) = hints.filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!("Spezifische Hinweise für diese Quelle:\n{hints}\n\n"));
    }
    prompt.push_str(
        "Extrahiere familienfreundliche Veranstaltungen (ab 4 Jahren) innerhalb dieses Zeitraums und gib sie als JSON-Array zurück.",
    );
    prompt
}

pub fn format_navigation_prompt(base_url: &str, nav_html: &str) -> String {
    NAVIGATION_PROMPT
        .replace("{base_url}", base_url)
        .replace("{nav_html}", nav_html)
}

fn hints_section(hints: Option<&str>) -> String {
    match hints.filter(|h| !h.trim().is_empty()) {
        Some(hints) => format!("Spezifische Hinweise für diese Quelle:\n{hints}\n\n"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompts_substitute() {
        let system = format_extraction_system_prompt(2026);
        assert!(system.contains("Jahr 2026"));
        assert!(!system.contains("{current_year}"));

        let user = format_extraction_user_prompt(
            "Fundus Theater",
            "https://fundus-theater.de/spielplan",
            "## Ritter Rost",
            "Tickets -> https://fundus-theater.de/tickets",
            None,
        );
        assert!(user.contains("Quelle: Fundus Theater"));
        assert!(user.contains("## Ritter Rost"));
        assert!(!user.contains("{content}"));
        assert!(!user.contains("{hints_section}"));
    }

    #[test]
    fn test_hints_are_injected_when_present() {
        let with_hints = format_extraction_user_prompt(
            "Quelle",
            "https://example.de",
            "Inhalt",
            "Keine Links gefunden.",
            Some("Nur Events im Großen Saal"),
        );
        assert!(with_hints.contains("Spezifische Hinweise für diese Quelle:\nNur Events im Großen Saal"));

        let without = format_extraction_user_prompt(
            "Quelle",
            "https://example.de",
            "Inhalt",
            "Keine Links gefunden.",
            Some("   "),
        );
        assert!(!without.contains("Spezifische Hinweise"));
    }

    #[test]
    fn test_venue_lookup_prompt_lists_names() {
        let prompt = format_venue_lookup_prompt(&[
            "Fundus Theater".to_string(),
            "Zinnschmelze".to_string(),
        ]);
        assert!(prompt.contains("- Fundus Theater\n- Zinnschmelze"));
        assert!(!prompt.contains("{venues}"));
    }

    #[test]
    fn test_vision_user_prompt_carries_window() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 15).unwrap();
        let prompt = format_vision_user_prompt("https://zirkus.de", today, end, Some("Tabelle links"));
        assert!(prompt.contains("Heute ist der 01.02.2026"));
        assert!(prompt.contains("bis 15.02.2026"));
        assert!(prompt.contains("Tabelle links"));
    }

    #[test]
    fn test_navigation_prompt_substitutes() {
        let prompt = format_navigation_prompt("https://theater.de", "<nav></nav>");
        assert!(prompt.contains("Base URL: https://theater.de"));
        assert!(prompt.contains("<nav></nav>"));
        assert!(prompt.ends_with("Calendar URL:"));
    }
}

use serenity::all::*;

use crate::AppContext;
use crate::antiraid::{EventReport, SanctionOutcome};

pub struct ModLog;

impl ModLog {
    /// Embed dla próby sankcji; `None` gdy nie było czego logować.
    pub fn embed(report: &EventReport) -> Option<CreateEmbed> {
        let sanction = report.sanction.as_ref()?;
        let (status, colour) = match &sanction.outcome {
            SanctionOutcome::Applied => ("✅ zbanowany".to_string(), Colour::new(0xE74C3C)),
            SanctionOutcome::Failed(cause) => (format!("❌ nieudany: {cause}"), Colour::new(0xF1C40F)),
            // drugi i kolejny trigger tego samego burstu – bez wpisu
            SanctionOutcome::Suppressed => return None,
        };
        let v = &report.verdict;
        Some(
            CreateEmbed::new()
                .title("🛡️ Anti-raid")
                .colour(colour)
                .field("Użytkownik", format!("<@{}>", v.actor.0), true)
                .field("Akcja", v.action_type.as_str(), true)
                .field("Licznik", format!("{}/{}", v.count, v.threshold), true)
                .field("Powód", sanction.reason, false)
                .field("Status", status, false)
                .timestamp(Timestamp::now())
                .footer(CreateEmbedFooter::new("Fusion Guard – Anti-raid")),
        )
    }

    pub async fn post(http: &Http, app: &AppContext, report: &EventReport) {
        let Some(ch_id) = app.settings.antiraid.log_channel_id.filter(|id| *id != 0) else {
            return;
        };
        let Some(embed) = Self::embed(report) else {
            return;
        };
        if let Err(e) = ChannelId::new(ch_id)
            .send_message(http, CreateMessage::new().embed(embed))
            .await
        {
            tracing::warn!(error=?e, ch_id, "anti-raid log post failed");
        }
    }
}

//! Default configuration template with all options documented.
//!
//! Written by `courier config init`. Every value matches the schema default,
//! so an untouched file behaves exactly like having no file at all.

/// Generate the default config template.
pub fn default_config_template() -> String {
    r##"# Courier Configuration
# =====================
# Environment variable substitution is supported: ${ENV_VAR} or ${ENV_VAR:-default}
# Provider credentials are NOT configured here; they live in each business's
# integration records.

# ══════════════════════════════════════════════════════════════════════════════
# SERVER
# ══════════════════════════════════════════════════════════════════════════════

[server]
bind = "127.0.0.1"
port = 8787
# api_token = "${COURIER_API_TOKEN}"     # Bearer token required on /api/* routes
# app_secret = "${META_APP_SECRET}"      # Enables X-Hub-Signature-256 checks on webhooks

[database]
url = "sqlite://courier.db?mode=rwc"
max_connections = 5

# ══════════════════════════════════════════════════════════════════════════════
# OUTBOUND QUEUE
# ══════════════════════════════════════════════════════════════════════════════

[queue]
batch_size = 100                  # Rows fetched per loop iteration
concurrency = 10                  # Dispatches in flight per chunk
deadline_secs = 55                # Wall-clock budget of one invocation
max_retries = 3                   # Failures on distinct days before a message is terminal
stale_claim_secs = 600            # Release rows stuck in "processing" after this long

[platforms]
request_timeout_secs = 10

[platforms.whatsapp]
api_base = "https://graph.facebook.com"
api_version = "v21.0"

[platforms.instagram]
api_base = "https://graph.facebook.com"
fallback_api_base = "https://graph.instagram.com"
api_version = "v21.0"

[email]
provider = "resend"               # "resend" or "smtp"

[email.resend]
api_base = "https://api.resend.com"

[email.smtp]
# host = "smtp.example.com"
port = 587
# username = "mailer"
# password = "${SMTP_PASSWORD}"
use_tls = true

# ══════════════════════════════════════════════════════════════════════════════
# TRIGGER GENERATORS
# ══════════════════════════════════════════════════════════════════════════════

[triggers]
timezone = "UTC"                  # Defines "today" for daily scans and retry days
birthday_jitter_minutes = 60
inactive_jitter_hours = 4
default_inactive_days = 30
promotion_settle_secs = 3
promotion_immediate_delay_secs = 60
promotion_spacing_secs = 5
insert_batch_size = 100
welcome_delay_secs = 120

# ══════════════════════════════════════════════════════════════════════════════
# INBOUND
# ══════════════════════════════════════════════════════════════════════════════

[inbound]
debounce_secs = 7                 # Only the last message of a burst gets a reply
dedup_ttl_secs = 60

[responder]
# base_url = "${RESPONDER_URL:-http://127.0.0.1:8080}"
timeout_secs = 30

# ══════════════════════════════════════════════════════════════════════════════
# SCHEDULER / METRICS
# ══════════════════════════════════════════════════════════════════════════════

[schedule]
enabled = true
queue = "* * * * *"               # Process the queue every minute
daily_checks = "0 9 * * *"        # Birthday and inactivity scans

[metrics]
enabled = true
prometheus_endpoint = true
"##
    .to_string()
}

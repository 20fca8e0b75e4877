/// supported languages for the bot UI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    En,
    Fa,
}

impl Lang {
    /// creates Lang from Telegram's language_code (e.g., "fa", "en", "de")
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.split('-').next().unwrap_or(c)) {
            Some("fa") => Lang::Fa,
            _ => Lang::En,
        }
    }
}

// =============================================================================
// Error messages
// =============================================================================

impl Lang {
    pub fn error_account_access(&self) -> &'static str {
        match self {
            Lang::En => {
                "❌ Sorry, there was an error accessing your account. Please try again later."
            }
            Lang::Fa => "❌ متأسفانه دسترسی به حساب شما با خطا مواجه شد. لطفاً بعداً دوباره تلاش کنید.",
        }
    }

    pub fn error_processing_request(&self) -> &'static str {
        match self {
            Lang::En => "❌ Error processing your request. Please try again later.",
            Lang::Fa => "❌ خطا در پردازش درخواست. لطفاً بعداً دوباره تلاش کنید.",
        }
    }

    pub fn error_not_srt(&self) -> &'static str {
        match self {
            Lang::En => "📄 Please send a subtitle file with the <code>.srt</code> extension.",
            Lang::Fa => "📄 لطفاً یک فایل زیرنویس با پسوند <code>.srt</code> ارسال کنید.",
        }
    }

    pub fn error_file_too_large(&self, max_mb: u32) -> String {
        match self {
            Lang::En => format!("❌ The file is too large. The limit is {} MB.", max_mb),
            Lang::Fa => format!("❌ حجم فایل زیاد است. حداکثر حجم مجاز {} مگابایت است.", max_mb),
        }
    }

    pub fn error_download(&self) -> &'static str {
        match self {
            Lang::En => "❌ Could not download your file. Please send it again.",
            Lang::Fa => "❌ دریافت فایل ممکن نشد. لطفاً دوباره ارسال کنید.",
        }
    }

    pub fn error_invalid_subtitle(&self, details: &str) -> String {
        match self {
            Lang::En => format!(
                "❌ This does not look like a valid SRT file.\n\n<i>{}</i>",
                details
            ),
            Lang::Fa => format!(
                "❌ این فایل یک زیرنویس SRT معتبر نیست.\n\n<i>{}</i>",
                details
            ),
        }
    }

    pub fn error_insufficient_funds(&self, balance: &str, required: &str) -> String {
        match self {
            Lang::En => format!(
                "❌ Insufficient balance.\n\nBalance: <b>{}</b> tomans\nRequired: <b>{}</b> tomans\n\nUse /topup to add funds.",
                balance, required
            ),
            Lang::Fa => format!(
                "❌ موجودی کافی نیست.\n\nموجودی: <b>{}</b> تومان\nمبلغ مورد نیاز: <b>{}</b> تومان\n\nبرای افزایش موجودی از /topup استفاده کنید.",
                balance, required
            ),
        }
    }

    pub fn error_translation_not_found(&self) -> &'static str {
        match self {
            Lang::En => "❌ This translation request no longer exists.",
            Lang::Fa => "❌ این درخواست ترجمه دیگر وجود ندارد.",
        }
    }

    pub fn error_already_started(&self) -> &'static str {
        match self {
            Lang::En => "⏳ This file is already being translated.",
            Lang::Fa => "⏳ این فایل در حال ترجمه است.",
        }
    }

    pub fn error_already_finished(&self) -> &'static str {
        match self {
            Lang::En => "ℹ️ This request is already finished. Send the file again to start over.",
            Lang::Fa => "ℹ️ این درخواست قبلاً به پایان رسیده است. برای شروع دوباره، فایل را مجدداً ارسال کنید.",
        }
    }

    pub fn error_queue_full(&self) -> &'static str {
        match self {
            Lang::En => "⏳ The translator is busy right now. Please try again in a few minutes.",
            Lang::Fa => "⏳ مترجم در حال حاضر مشغول است. لطفاً چند دقیقه دیگر تلاش کنید.",
        }
    }

    pub fn error_topup_usage(&self, minimum: &str) -> String {
        match self {
            Lang::En => format!(
                "Usage: <code>/topup 50000</code>\n\nAmount is in tomans, minimum {}.",
                minimum
            ),
            Lang::Fa => format!(
                "نحوه استفاده: <code>/topup 50000</code>\n\nمبلغ به تومان است، حداقل {}.",
                minimum
            ),
        }
    }

    pub fn error_payment_processing(&self) -> &'static str {
        match self {
            Lang::En => "❌ Error creating the payment. Please try again later.",
            Lang::Fa => "❌ خطا در ایجاد پرداخت. لطفاً بعداً دوباره تلاش کنید.",
        }
    }
}

// =============================================================================
// Welcome, help and balance
// =============================================================================

impl Lang {
    pub fn welcome(&self, balance: &str, price_per_line: &str) -> String {
        match self {
            Lang::En => format!(
                "👋 <b>Welcome to the subtitle translator!</b>\n\n\
                 Send me an <code>.srt</code> file and I will translate it for you.\n\n\
                 💰 Price: <b>{}</b> tomans per line\n\
                 💳 Your balance: <b>{}</b> tomans\n\n\
                 /balance · /topup · /help",
                price_per_line, balance
            ),
            Lang::Fa => format!(
                "👋 <b>به ربات ترجمه زیرنویس خوش آمدید!</b>\n\n\
                 یک فایل <code>.srt</code> بفرستید تا آن را برایتان ترجمه کنم.\n\n\
                 💰 قیمت: <b>{}</b> تومان برای هر خط\n\
                 💳 موجودی شما: <b>{}</b> تومان\n\n\
                 /balance · /topup · /help",
                price_per_line, balance
            ),
        }
    }

    pub fn help(&self, price_per_line: &str) -> String {
        match self {
            Lang::En => format!(
                "<b>How it works</b>\n\n\
                 1. Send an <code>.srt</code> subtitle file.\n\
                 2. Check the estimate and press <b>Translate</b>.\n\
                 3. Receive the translated file.\n\n\
                 You pay <b>{}</b> tomans for each translated line. Lines that could not be \
                 translated are not charged.\n\n\
                 /balance shows your balance and recent transactions.\n\
                 /topup &lt;amount&gt; adds funds.",
                price_per_line
            ),
            Lang::Fa => format!(
                "<b>راهنما</b>\n\n\
                 ۱. یک فایل زیرنویس <code>.srt</code> بفرستید.\n\
                 ۲. برآورد هزینه را ببینید و <b>ترجمه</b> را بزنید.\n\
                 ۳. فایل ترجمه‌شده را دریافت کنید.\n\n\
                 برای هر خط ترجمه‌شده <b>{}</b> تومان پرداخت می‌کنید. خطوطی که ترجمه نشوند \
                 هزینه‌ای ندارند.\n\n\
                 /balance موجودی و تراکنش‌های اخیر را نشان می‌دهد.\n\
                 /topup &lt;مبلغ&gt; موجودی را افزایش می‌دهد.",
                price_per_line
            ),
        }
    }

    pub fn balance(&self, balance: &str, history: &str) -> String {
        match self {
            Lang::En => format!(
                "💳 Your balance: <b>{}</b> tomans\n\n<b>Recent transactions</b>\n{}",
                balance, history
            ),
            Lang::Fa => format!(
                "💳 موجودی شما: <b>{}</b> تومان\n\n<b>تراکنش‌های اخیر</b>\n{}",
                balance, history
            ),
        }
    }

    pub fn stats(&self, total_users: i64) -> String {
        match self {
            Lang::En => format!("👥 Total users: <b>{}</b>", total_users),
            Lang::Fa => format!("👥 تعداد کل کاربران: <b>{}</b>", total_users),
        }
    }

    pub fn error_admin_only(&self) -> &'static str {
        match self {
            Lang::En => "⛔ This command is only for admins.",
            Lang::Fa => "⛔ این دستور فقط برای مدیران است.",
        }
    }

    pub fn history_empty(&self) -> &'static str {
        match self {
            Lang::En => "<i>No transactions yet.</i>",
            Lang::Fa => "<i>هنوز تراکنشی ثبت نشده است.</i>",
        }
    }

    pub fn history_entry(&self, credit: bool, amount: &str, description: &str, date: &str) -> String {
        let sign = if credit { "➕" } else { "➖" };
        match self {
            Lang::En => format!("{} {} tomans · {} · {}", sign, amount, description, date),
            Lang::Fa => format!("{} {} تومان · {} · {}", sign, amount, description, date),
        }
    }
}

// =============================================================================
// File translation
// =============================================================================

impl Lang {
    pub fn file_estimate(
        &self,
        file_name: &str,
        lines: i32,
        price_per_line: &str,
        cost: &str,
        balance: Option<&str>,
        reused: bool,
    ) -> String {
        let note = match (self, reused) {
            (_, false) => "",
            (Lang::En, true) => "\n\n<i>This file is already waiting; here is the same request.</i>",
            (Lang::Fa, true) => "\n\n<i>این فایل قبلاً ثبت شده است؛ همان درخواست نمایش داده شد.</i>",
        };
        match self {
            Lang::En => format!(
                "📄 <b>{}</b>\n\n\
                 Lines: <b>{}</b>\n\
                 Price per line: {} tomans\n\
                 Estimated cost: <b>{}</b> tomans{}{}",
                file_name,
                lines,
                price_per_line,
                cost,
                balance
                    .map(|b| format!("\nYour balance: {} tomans", b))
                    .unwrap_or_default(),
                note
            ),
            Lang::Fa => format!(
                "📄 <b>{}</b>\n\n\
                 تعداد خطوط: <b>{}</b>\n\
                 قیمت هر خط: {} تومان\n\
                 هزینه تخمینی: <b>{}</b> تومان{}{}",
                file_name,
                lines,
                price_per_line,
                cost,
                balance
                    .map(|b| format!("\nموجودی شما: {} تومان", b))
                    .unwrap_or_default(),
                note
            ),
        }
    }

    pub fn btn_translate(&self) -> &'static str {
        match self {
            Lang::En => "✅ Translate",
            Lang::Fa => "✅ ترجمه",
        }
    }

    pub fn btn_cancel(&self) -> &'static str {
        match self {
            Lang::En => "✖️ Cancel",
            Lang::Fa => "✖️ لغو",
        }
    }

    pub fn translation_queued(&self) -> &'static str {
        match self {
            Lang::En => "⏳ Your file is in the queue...",
            Lang::Fa => "⏳ فایل شما در صف ترجمه است...",
        }
    }

    pub fn translation_progress(&self, bar: &str, percent: f64) -> String {
        match self {
            Lang::En => format!("🔄 Translating...\n\n{} {:.0}%", bar, percent),
            Lang::Fa => format!("🔄 در حال ترجمه...\n\n{} {:.0}%", bar, percent),
        }
    }

    pub fn translation_complete(
        &self,
        billed_lines: i32,
        total_lines: i32,
        cost: &str,
        balance: Option<&str>,
        partial: bool,
    ) -> String {
        let partial_note = match (self, partial) {
            (_, false) => "",
            (Lang::En, true) => {
                "\n\n⚠️ Some lines could not be translated and were left blank. They were not charged."
            }
            (Lang::Fa, true) => {
                "\n\n⚠️ برخی خطوط ترجمه نشدند و خالی ماندند. هزینه‌ای برای آن‌ها کسر نشد."
            }
        };
        match self {
            Lang::En => format!(
                "✅ <b>Translation complete!</b>\n\n\
                 Translated lines: {}/{}\n\
                 Charged: <b>{}</b> tomans{}{}",
                billed_lines,
                total_lines,
                cost,
                balance
                    .map(|b| format!("\nBalance: {} tomans", b))
                    .unwrap_or_default(),
                partial_note
            ),
            Lang::Fa => format!(
                "✅ <b>ترجمه انجام شد!</b>\n\n\
                 خطوط ترجمه‌شده: {}/{}\n\
                 هزینه کسرشده: <b>{}</b> تومان{}{}",
                billed_lines,
                total_lines,
                cost,
                balance
                    .map(|b| format!("\nموجودی: {} تومان", b))
                    .unwrap_or_default(),
                partial_note
            ),
        }
    }

    pub fn translation_failed(&self) -> &'static str {
        match self {
            Lang::En => "❌ Translation failed. Nothing was charged. Please try again later.",
            Lang::Fa => "❌ ترجمه ناموفق بود. هزینه‌ای کسر نشد. لطفاً بعداً دوباره تلاش کنید.",
        }
    }

    pub fn translation_cancelled(&self) -> &'static str {
        match self {
            Lang::En => "✖️ Translation cancelled.",
            Lang::Fa => "✖️ ترجمه لغو شد.",
        }
    }

    pub fn document_caption(&self, file_name: &str) -> String {
        match self {
            Lang::En => format!("🎬 Translated: {}", file_name),
            Lang::Fa => format!("🎬 ترجمه‌شده: {}", file_name),
        }
    }
}

// =============================================================================
// Payments
// =============================================================================

impl Lang {
    pub fn topup_link(&self, amount: &str) -> String {
        match self {
            Lang::En => format!(
                "💳 Payment of <b>{}</b> tomans is ready.\n\nPress the button below to pay. Your balance updates once the payment is confirmed.",
                amount
            ),
            Lang::Fa => format!(
                "💳 پرداخت <b>{}</b> تومان آماده است.\n\nبرای پرداخت دکمه زیر را بزنید. پس از تأیید پرداخت، موجودی شما به‌روز می‌شود.",
                amount
            ),
        }
    }

    pub fn btn_pay(&self) -> &'static str {
        match self {
            Lang::En => "💳 Pay",
            Lang::Fa => "💳 پرداخت",
        }
    }

    pub fn payment_success(&self, amount: &str, balance: &str) -> String {
        match self {
            Lang::En => format!(
                "🎉 <b>Payment received!</b>\n\n{} tomans were added to your account.\nBalance: <b>{}</b> tomans",
                amount, balance
            ),
            Lang::Fa => format!(
                "🎉 <b>پرداخت دریافت شد!</b>\n\n{} تومان به حساب شما اضافه شد.\nموجودی: <b>{}</b> تومان",
                amount, balance
            ),
        }
    }
}

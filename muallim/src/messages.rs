//! Fixed user-facing copy, in Arabic. Every string shown to the learner lives
//! here so the controller, the service layer, and the front-end agree on it.

// ── Image validation ───────────────────────────────────────────────

pub const VALIDATION_NOT_AN_IMAGE: &str =
    "رفع ملفات PDF للمنهج يتم من صفحة إعداد المنهج، أما هنا فيمكن رفع صور فقط.";
pub const VALIDATION_IMAGE_TOO_LARGE: &str =
    "حجم الصورة كبير جداً. يرجى اختيار صورة أصغر من 10 ميجابايت.";
pub const VALIDATION_UNSUPPORTED_FORMAT: &str =
    "نوع الصورة غير مدعوم. يرجى استخدام صور بصيغة JPG، PNG، GIF، أو WebP.";
pub const VALIDATION_IMAGE_READ_FAILED: &str =
    "حدث خطأ أثناء قراءة الصورة. يرجى المحاولة مرة أخرى.";

// ── Answer request failures ────────────────────────────────────────
// One fixed string per failure class. The server's `detail` field, when
// present, replaces the string for every class except the gateway-layer
// statuses (502/503/504), whose copy is always fixed.

pub const ERR_BAD_REQUEST: &str =
    "خطأ في البيانات المرسلة. يرجى التحقق من صحة السؤال والصورة.";
pub const ERR_PAYLOAD_TOO_LARGE: &str = "حجم الصورة كبير جداً. الحد الأقصى 10 ميجابايت.";
pub const ERR_UNPROCESSABLE: &str = "تنسيق الصورة غير مدعوم أو البيانات غير صالحة.";
pub const ERR_RATE_LIMITED: &str =
    "تم تجاوز عدد الطلبات المسموح. يرجى الانتظار قليلاً ثم المحاولة مرة أخرى.";
pub const ERR_SERVER: &str = "خطأ في الخادم. يرجى المحاولة لاحقاً.";
pub const ERR_BAD_GATEWAY: &str = "خطأ في الاتصال مع الخادم. يرجى المحاولة لاحقاً.";
pub const ERR_UNAVAILABLE: &str = "الخدمة غير متاحة حالياً. يرجى المحاولة لاحقاً.";
pub const ERR_GATEWAY_TIMEOUT: &str =
    "انتهت مهلة الاتصال مع الخادم. يرجى المحاولة مرة أخرى.";
pub const ERR_NETWORK: &str =
    "لا يمكن الاتصال بالخادم. تحقق من اتصال الإنترنت وحاول مرة أخرى.";
pub const ERR_REQUEST_SETUP: &str =
    "خطأ في إعداد الطلب. يرجى إعادة تشغيل التطبيق والمحاولة مرة أخرى.";

/// Copy for a status code outside the known table.
pub fn err_unknown_status(status: u16) -> String {
    format!("خطأ من الخادم ({status}). يرجى المحاولة مرة أخرى.")
}

/// Shown in place of an answer the service returned empty.
pub const ANSWER_EMPTY_FALLBACK: &str = "عذراً، لم أتمكن من الحصول على إجابة.";

/// Banner line for failures outside the conversation flow.
pub fn error_display(message: &str) -> String {
    format!("خطأ: {message}")
}

// ── Review flow ────────────────────────────────────────────────────

pub const REVIEW_TITLE: &str = "قيّم هذه الإجابة";
pub const REVIEW_CHOOSE_RATING: &str = "يرجى اختيار تقييم";
pub const REVIEW_SENDING: &str = "جاري الإرسال...";
pub const REVIEW_FEEDBACK_HINT: &str = "شاركنا رأيك حول جودة الإجابة...";
pub const REVIEW_THANKS: &str = "تم إرسال التقييم. شكراً لك!";
pub const REVIEW_SEND_FAILED: &str = "فشل في إرسال التقييم";
pub const REVIEW_STATS_FAILED: &str = "فشل في جلب إحصائيات التقييمات";
pub const STATS_TOTAL_LABEL: &str = "إجمالي التقييمات";
pub const STATS_AVERAGE_LABEL: &str = "متوسط التقييم";

// ── Front-end copy ─────────────────────────────────────────────────

pub const APP_TITLE: &str = "معلّم - المساعد التعليمي الذكي";
pub const APP_SUBTITLE: &str = "اسأل سؤالك الرياضي وسأساعدك بالحل خطوة بخطوة";
pub const WELCOME_TITLE: &str = "مرحباً بك!";
pub const WELCOME_HINT: &str = "اطرح سؤالك الرياضي أو ارفع صورة للمسألة وسأساعدك في حلها";
pub const THINKING: &str = "جاري التفكير...";
pub const INPUT_PLACEHOLDER: &str = "اكتب سؤالك هنا...";

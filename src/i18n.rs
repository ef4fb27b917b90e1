// ==========================================
// 加药管理系统 - 国际化 (i18n)
// ==========================================
// 使用 rust-i18n，语言文件位于 locales/（zh-CN 默认，en）
// rust_i18n::i18n! 宏已在 lib.rs 中初始化
// 占位符格式: %{name}
// ==========================================

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言（"zh-CN" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use chem_dosing::i18n::t;
/// let msg = t("anomaly.possible_refill");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use chem_dosing::i18n::t_with_args;
/// let msg = t_with_args("import.unknown_tank", &[("name", "CT-3")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

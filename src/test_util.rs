pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME_MUTEX serializes every test that touches HOME.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Fixed-pitch metrics so layout tests do not depend on installed fonts.
pub(crate) struct MonospaceMeasurer;

impl crate::render::TextMeasurer for MonospaceMeasurer {
    fn text_width(&self, text: &str, font: crate::render::FontSpec) -> f32 {
        text.chars().count() as f32 * font.size as f32 * 0.5
    }

    fn line_height(&self, font: crate::render::FontSpec) -> f32 {
        font.size as f32 * 1.2
    }

    fn ascent(&self, font: crate::render::FontSpec) -> f32 {
        font.size as f32 * 0.9
    }
}

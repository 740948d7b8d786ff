pub mod line_pass;
pub mod outline_pass;
pub mod render_pass_context;
pub mod toon_pass;

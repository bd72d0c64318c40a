use postframe::render::strategies_for;

#[test]
fn strategy_ladder_snapshot() {
    let mut table = String::new();
    for body_chars in [150, 350, 1500] {
        table.push_str(&format!("body_chars={}\n", body_chars));
        for strategy in strategies_for(body_chars, 42) {
            table.push_str(&format!(
                "  ratio={:.2} max_chars={} font={}\n",
                strategy.image_area_ratio, strategy.max_body_chars, strategy.starting_font_size
            ));
        }
    }
    insta::assert_snapshot!(table);
}

use skald_persona::resolve;

pub fn execute(role: &str, team: &str) -> anyhow::Result<()> {
    let persona = resolve(role, team, None);
    println!("{}", serde_json::to_string_pretty(&persona)?);
    Ok(())
}

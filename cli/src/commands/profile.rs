use anyhow::Result;

use metamorph_core::models::{Profile, ProfileForm};
use metamorph_core::service::MetamorphService;

use super::helpers::parse_date;

/// Raw `profile set` arguments, as typed on the command line.
pub(crate) struct ProfileArgs {
    pub start_date: Option<String>,
    pub start_weight: Option<String>,
    pub target_weight: Option<String>,
    pub height: Option<String>,
    pub age: Option<String>,
    pub intensity: Option<String>,
    pub photo: Option<String>,
}

pub(crate) fn cmd_profile_set(service: &MetamorphService, args: ProfileArgs, json: bool) -> Result<()> {
    let form = ProfileForm {
        start_date: parse_date(args.start_date.as_deref())?,
        start_weight: args.start_weight,
        target_weight: args.target_weight,
        height: args.height,
        age: args.age,
        intensity: args.intensity,
        start_photo: args.photo,
    };
    let profile = service.save_profile_form(&form)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Profile saved.");
        print_profile(&profile);
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(service: &MetamorphService, json: bool) -> Result<()> {
    let profile = service.get_latest_profile()?;

    match profile {
        Some(p) if json => println!("{}", serde_json::to_string_pretty(&p)?),
        Some(p) => print_profile(&p),
        None if json => println!("{}", serde_json::json!({ "error": "No profile configured" })),
        None => eprintln!("No profile yet. Use `metamorph profile set` to create one."),
    }
    Ok(())
}

fn print_profile(p: &Profile) {
    println!("  Start date:    {}", p.start_date.format("%Y-%m-%d"));
    println!("  Start weight:  {:.1} kg", p.start_weight);
    println!("  Target weight: {:.1} kg", p.target_weight);
    println!("  Height:        {:.0} cm", p.height);
    println!("  Age:           {:.0}", p.age);
    println!("  Diet mode:     {}", p.intensity);
    if let Some(ref photo) = p.start_photo {
        println!("  Start photo:   {photo}");
    }
}

//! Role-based navigation menus and menu search

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Admin,
  Entrepreneur,
  Investor,
  ServiceProvider,
  Observer,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
  pub name: &'static str,
  pub path: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

const DASHBOARD: MenuItem = MenuItem {
  name: "dashboard",
  path: "/dashboard",
  aliases: &["home", "d"],
  description: "Overview of your activity",
};

const MESSAGES: MenuItem = MenuItem {
  name: "messages",
  path: "/messages",
  aliases: &["inbox", "m"],
  description: "Conversations with other members",
};

const NOTIFICATIONS: MenuItem = MenuItem {
  name: "notifications",
  path: "/notifications",
  aliases: &["alerts", "n"],
  description: "Recent notifications",
};

const PROFILE: MenuItem = MenuItem {
  name: "profile",
  path: "/profile",
  aliases: &["account", "me"],
  description: "Your profile and settings",
};

const ADMIN_MENU: &[MenuItem] = &[
  DASHBOARD,
  MenuItem {
    name: "users",
    path: "/admin/users",
    aliases: &["u", "members"],
    description: "Manage user accounts and roles",
  },
  MenuItem {
    name: "opportunities",
    path: "/admin/opportunities",
    aliases: &["o", "review"],
    description: "Review and publish opportunities",
  },
  MenuItem {
    name: "escrow",
    path: "/admin/escrow",
    aliases: &["payments", "e"],
    description: "Escrow accounts and releases",
  },
  MenuItem {
    name: "reports",
    path: "/admin/reports",
    aliases: &["r", "analytics"],
    description: "Platform reports",
  },
  NOTIFICATIONS,
  PROFILE,
];

const ENTREPRENEUR_MENU: &[MenuItem] = &[
  DASHBOARD,
  MenuItem {
    name: "opportunities",
    path: "/entrepreneur/opportunities",
    aliases: &["o", "pitches"],
    description: "Your investment opportunities",
  },
  MenuItem {
    name: "create",
    path: "/entrepreneur/opportunities/new",
    aliases: &["new", "c"],
    description: "Create a new opportunity",
  },
  MenuItem {
    name: "offers",
    path: "/entrepreneur/offers",
    aliases: &["bids"],
    description: "Offers received from investors",
  },
  MenuItem {
    name: "services",
    path: "/entrepreneur/services",
    aliases: &["s", "providers"],
    description: "Request professional services",
  },
  MESSAGES,
  NOTIFICATIONS,
  PROFILE,
];

const INVESTOR_MENU: &[MenuItem] = &[
  DASHBOARD,
  MenuItem {
    name: "browse",
    path: "/investor/opportunities",
    aliases: &["b", "discover", "opportunities"],
    description: "Browse published opportunities",
  },
  MenuItem {
    name: "portfolio",
    path: "/investor/portfolio",
    aliases: &["p", "investments"],
    description: "Your investments",
  },
  MenuItem {
    name: "offers",
    path: "/investor/offers",
    aliases: &["bids"],
    description: "Offers you have made",
  },
  MenuItem {
    name: "pools",
    path: "/investor/pools",
    aliases: &["syndicates"],
    description: "Investment pools",
  },
  MESSAGES,
  NOTIFICATIONS,
  PROFILE,
];

const SERVICE_PROVIDER_MENU: &[MenuItem] = &[
  DASHBOARD,
  MenuItem {
    name: "requests",
    path: "/service-provider/requests",
    aliases: &["r", "jobs"],
    description: "Service requests from entrepreneurs",
  },
  MenuItem {
    name: "services",
    path: "/service-provider/services",
    aliases: &["s", "catalogue"],
    description: "Services you offer",
  },
  MESSAGES,
  NOTIFICATIONS,
  PROFILE,
];

const OBSERVER_MENU: &[MenuItem] = &[
  DASHBOARD,
  MenuItem {
    name: "watchlist",
    path: "/observer/watchlist",
    aliases: &["w", "following"],
    description: "Opportunities you follow",
  },
  NOTIFICATIONS,
  PROFILE,
];

/// Static menu for a role
pub fn menu_for(role: Role) -> &'static [MenuItem] {
  match role {
    Role::Admin => ADMIN_MENU,
    Role::Entrepreneur => ENTREPRENEUR_MENU,
    Role::Investor => INVESTOR_MENU,
    Role::ServiceProvider => SERVICE_PROVIDER_MENU,
    Role::Observer => OBSERVER_MENU,
  }
}

/// Menu items for `role` matching `input`, best match first
pub fn search_menu(role: Role, input: &str) -> Vec<&'static MenuItem> {
  let menu = menu_for(role);
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return menu.iter().collect();
  }

  let mut matches: Vec<(&MenuItem, u32)> = Vec::new();

  for item in menu {
    // Exact match on name
    if item.name == input_lower {
      matches.push((item, 0));
      continue;
    }

    if item.aliases.contains(&input_lower.as_str()) {
      matches.push((item, 1));
      continue;
    }

    if item.name.starts_with(&input_lower) {
      matches.push((item, 2));
      continue;
    }

    if item.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((item, 3));
      continue;
    }

    // Fuzzy match (contains)
    if item.name.contains(&input_lower) {
      matches.push((item, 4));
      continue;
    }

    if item.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((item, 5));
    }
  }

  // Stable sort keeps menu order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(item, _)| item).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_role_has_dashboard_first() {
    for role in Role::value_variants() {
      assert_eq!(menu_for(*role)[0].name, "dashboard");
    }
  }

  #[test]
  fn test_admin_only_items() {
    assert!(menu_for(Role::Admin).iter().any(|i| i.name == "users"));
    assert!(!menu_for(Role::Investor).iter().any(|i| i.name == "users"));
  }

  #[test]
  fn test_empty_input_returns_whole_menu() {
    assert_eq!(search_menu(Role::Investor, "").len(), INVESTOR_MENU.len());
  }

  #[test]
  fn test_exact_match() {
    let results = search_menu(Role::Investor, "portfolio");
    assert_eq!(results[0].name, "portfolio");
  }

  #[test]
  fn test_alias_match() {
    let results = search_menu(Role::Investor, "opportunities");
    assert_eq!(results[0].name, "browse");
  }

  #[test]
  fn test_prefix_match() {
    let results = search_menu(Role::Entrepreneur, "off");
    assert_eq!(results[0].name, "offers");
  }

  #[test]
  fn test_fuzzy_match() {
    let results = search_menu(Role::ServiceProvider, "quest");
    assert_eq!(results[0].name, "requests");
  }

  #[test]
  fn test_no_match() {
    assert!(search_menu(Role::Observer, "escrow").is_empty());
  }
}

//! Static UI translation dictionaries.
//!
//! Lookups fall back to English, then to the key itself.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  En,
  Fr,
  Pt,
}

type Dictionary = &'static [(&'static str, &'static str)];

const EN: Dictionary = &[
  ("nav.dashboard", "Dashboard"),
  ("nav.opportunities", "Opportunities"),
  ("nav.offers", "Offers"),
  ("nav.portfolio", "Portfolio"),
  ("nav.messages", "Messages"),
  ("nav.notifications", "Notifications"),
  ("nav.profile", "Profile"),
  ("nav.logout", "Sign out"),
  ("opportunity.create", "Create opportunity"),
  ("opportunity.funding_goal", "Funding goal"),
  ("offer.make", "Make an offer"),
  ("offer.amount", "Offer amount"),
  ("notifications.mark_all_read", "Mark all as read"),
  ("notifications.empty", "You have no notifications"),
  ("offline.banner", "You are offline. Changes will sync when you reconnect."),
  ("offline.queued", "Saved offline. {{count}} change(s) waiting to sync."),
  ("sync.complete", "Synced {{count}} change(s)."),
];

const FR: Dictionary = &[
  ("nav.dashboard", "Tableau de bord"),
  ("nav.opportunities", "Opportunités"),
  ("nav.offers", "Offres"),
  ("nav.portfolio", "Portefeuille"),
  ("nav.messages", "Messages"),
  ("nav.notifications", "Notifications"),
  ("nav.profile", "Profil"),
  ("nav.logout", "Se déconnecter"),
  ("opportunity.create", "Créer une opportunité"),
  ("offer.make", "Faire une offre"),
  ("offer.amount", "Montant de l'offre"),
  ("notifications.mark_all_read", "Tout marquer comme lu"),
  ("notifications.empty", "Vous n'avez aucune notification"),
  ("offline.banner", "Vous êtes hors ligne. Les modifications seront synchronisées à la reconnexion."),
  ("sync.complete", "{{count}} modification(s) synchronisée(s)."),
];

const PT: Dictionary = &[
  ("nav.dashboard", "Painel"),
  ("nav.opportunities", "Oportunidades"),
  ("nav.offers", "Ofertas"),
  ("nav.portfolio", "Carteira"),
  ("nav.messages", "Mensagens"),
  ("nav.notifications", "Notificações"),
  ("nav.profile", "Perfil"),
  ("nav.logout", "Sair"),
  ("opportunity.create", "Criar oportunidade"),
  ("offer.make", "Fazer uma oferta"),
  ("notifications.mark_all_read", "Marcar tudo como lido"),
  ("notifications.empty", "Você não tem notificações"),
  ("offline.banner", "Você está offline. As alterações serão sincronizadas ao reconectar."),
];

fn dictionary(lang: Language) -> Dictionary {
  match lang {
    Language::En => EN,
    Language::Fr => FR,
    Language::Pt => PT,
  }
}

fn lookup(dict: Dictionary, key: &str) -> Option<&'static str> {
  dict.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub fn translate<'a>(lang: Language, key: &'a str) -> &'a str {
  lookup(dictionary(lang), key)
    .or_else(|| lookup(EN, key))
    .unwrap_or(key)
}

/// Translate and substitute `{{name}}` placeholders.
pub fn translate_with(lang: Language, key: &str, args: &[(&str, &str)]) -> String {
  args
    .iter()
    .fold(translate(lang, key).to_string(), |text, (name, value)| {
      text.replace(&format!("{{{{{}}}}}", name), value)
    })
}

use labswitch_core::Locale;
use labswitch_store::SessionRecord;

/// User-facing chat replies for one locale.
#[derive(Debug)]
pub struct Replies {
    pub missing_username: &'static str,
    pub checked_in: &'static str,
    pub already_checked_in: &'static str,
    pub checked_out: &'static str,
    pub no_active_check_in: &'static str,
    pub no_active_records: &'static str,
    pub active_records_header: &'static str,
    pub cleared: &'static str,
    pub already_on: &'static str,
    pub still_in_use: &'static str,
    pub command_failed: &'static str,
    pub starting: &'static str,
    pub stopping: &'static str,
}

pub const PT_BR: Replies = Replies {
    missing_username: "Ops! Parece que você não configurou seu Telegram Username.",
    checked_in: "Check-In processado!",
    already_checked_in: "Ops! Parece que você já fez check-in.",
    checked_out: "Check-Out processado!",
    no_active_check_in: "Ops! Você não tem registro de check-in ativo.",
    no_active_records: "Não existem registros ativos!",
    active_records_header: "Registros Ativos: ",
    cleared: "Limpeza de registros ativos processada! Você não deveria usar isso...",
    already_on: "Acho que lab já está ligado!",
    still_in_use: "Não posso desligar pois o ambiente está sendo usado!",
    command_failed: "Ops! Tivemos problemas com o seu comando... =(",
    starting: "Acionando o Ansible Tower para ligar o lab!",
    stopping: "Acionando o Ansible Tower para desligar o lab!",
};

pub const EN: Replies = Replies {
    missing_username: "Oops! Looks like you haven't set a Telegram username.",
    checked_in: "Check-in done!",
    already_checked_in: "Oops! Looks like you're already checked in.",
    checked_out: "Check-out done!",
    no_active_check_in: "Oops! You don't have an active check-in.",
    no_active_records: "There are no active records!",
    active_records_header: "Active records: ",
    cleared: "All active records cleared! You shouldn't be using this...",
    already_on: "I think the lab is already on!",
    still_in_use: "Can't power off, the lab is still in use!",
    command_failed: "Oops! Something went wrong with your command... =(",
    starting: "Asking Ansible Tower to power the lab on!",
    stopping: "Asking Ansible Tower to power the lab off!",
};

impl Replies {
    pub fn for_locale(locale: Locale) -> &'static Replies {
        match locale {
            Locale::PtBr => &PT_BR,
            Locale::En => &EN,
        }
    }

    /// Status listing: one `@username` line per active record.
    pub fn status(&self, active: &[SessionRecord]) -> String {
        if active.is_empty() {
            return self.no_active_records.to_string();
        }
        let mut text = String::from(self.active_records_header);
        for record in active {
            text.push_str("\n- @");
            text.push_str(&record.username);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lists_usernames() {
        let records = vec![SessionRecord::check_in("alice"), SessionRecord::check_in("bob")];
        assert_eq!(PT_BR.status(&records), "Registros Ativos: \n- @alice\n- @bob");
        assert_eq!(EN.status(&records), "Active records: \n- @alice\n- @bob");
    }

    #[test]
    fn status_empty() {
        assert_eq!(PT_BR.status(&[]), "Não existem registros ativos!");
    }

    #[test]
    fn locale_selection() {
        assert_eq!(Replies::for_locale(Locale::PtBr).checked_in, "Check-In processado!");
        assert_eq!(Replies::for_locale(Locale::En).checked_in, "Check-in done!");
    }
}

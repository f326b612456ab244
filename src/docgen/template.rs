//! Built-in procès-verbal templates.
//!
//! A template is plain text: lines starting with `# ` become DOCX headings,
//! everything else a paragraph. `{{NAME}}` placeholders are scalar; the
//! placeholders listed in [`LIST_FRAGMENTS`] are list-valued and expand to
//! one fragment line per element before scalar substitution.

pub struct Template {
    pub key: &'static str,
    pub title: &'static str,
    pub body: &'static str,
}

pub const LIST_ASSOCIES: &str = "LISTE_ASSOCIES";
pub const LIST_GERANTS: &str = "LISTE_GERANTS";
pub const LIST_REPARTITION: &str = "LIGNES_REPARTITION";

pub const LIST_FRAGMENTS: &[(&str, &str)] = &[
    (
        LIST_ASSOCIES,
        "- {{NOM_ASSOCIE}}, titulaire de la CIN n° {{CIN}}, détenant {{PARTS}} parts sociales ({{POURCENTAGE}} %)",
    ),
    (
        LIST_GERANTS,
        "- {{NOM_GERANT}}, titulaire de la CIN n° {{CIN}}, en qualité de {{FONCTION}}",
    ),
    (
        LIST_REPARTITION,
        "- {{NOM_ASSOCIE}} : {{PARTS}} parts, soit {{POURCENTAGE}} % du capital — {{MONTANT}} dinars",
    ),
];

const PV_AFFECTATION_BENEFICE: Template = Template {
    key: "pv-affectation-benefice",
    title: "PV d'affectation du résultat bénéficiaire",
    body: "\
# PROCÈS-VERBAL DE L'ASSEMBLÉE GÉNÉRALE ORDINAIRE

Société {{RAISON_SOCIALE}} — {{FORME_JURIDIQUE}} au capital de {{CAPITAL}} dinars
Siège social : {{SIEGE_SOCIAL}}
Matricule fiscal : {{MATRICULE_FISCAL}} — Registre de commerce : {{RC}}

L'an {{ANNEE}}, le {{DATE_GENERATION}}, les associés de la société {{RAISON_SOCIALE}} se sont réunis en assemblée générale ordinaire au siège social, sur convocation de la gérance.

Sont présents :
{{LISTE_ASSOCIES}}

La gérance est assurée par :
{{LISTE_GERANTS}}

# PREMIÈRE RÉSOLUTION — APPROBATION DES COMPTES

L'assemblée générale, après avoir entendu la lecture du rapport de gestion, approuve les états financiers de l'exercice {{EXERCICE}} faisant apparaître un bénéfice net de {{RESULTAT}} dinars.

Cette résolution est adoptée à l'unanimité.

# DEUXIÈME RÉSOLUTION — AFFECTATION DU RÉSULTAT

L'assemblée générale décide d'affecter le bénéfice de l'exercice {{EXERCICE}}, soit {{RESULTAT}} dinars, au compte « résultats reportés » après dotation de la réserve légale.

Cette résolution est adoptée à l'unanimité.

De tout ce qui précède, il a été dressé le présent procès-verbal, signé par les associés.
",
};

const PV_DISTRIBUTION_DIVIDENDES: Template = Template {
    key: "pv-distribution-dividendes",
    title: "PV de distribution de dividendes",
    body: "\
# PROCÈS-VERBAL DE L'ASSEMBLÉE GÉNÉRALE ORDINAIRE

Société {{RAISON_SOCIALE}} — {{FORME_JURIDIQUE}} au capital de {{CAPITAL}} dinars
Siège social : {{SIEGE_SOCIAL}}
Matricule fiscal : {{MATRICULE_FISCAL}} — Registre de commerce : {{RC}}

L'an {{ANNEE}}, le {{DATE_GENERATION}}, les associés de la société {{RAISON_SOCIALE}} se sont réunis en assemblée générale ordinaire au siège social.

Sont présents :
{{LISTE_ASSOCIES}}

# PREMIÈRE RÉSOLUTION — APPROBATION DES COMPTES

L'assemblée générale approuve les états financiers de l'exercice {{EXERCICE}} faisant apparaître un bénéfice net de {{RESULTAT}} dinars.

Cette résolution est adoptée à l'unanimité.

# DEUXIÈME RÉSOLUTION — DISTRIBUTION DE DIVIDENDES

L'assemblée générale décide de distribuer aux associés un montant global de {{DIVIDENDES}} dinars, réparti au prorata des parts sociales détenues :

{{LIGNES_REPARTITION}}

Cette résolution est adoptée à l'unanimité.

De tout ce qui précède, il a été dressé le présent procès-verbal, signé par les associés.
",
};

const PV_AFFECTATION_DEFICIT: Template = Template {
    key: "pv-affectation-deficit",
    title: "PV d'affectation du résultat déficitaire",
    body: "\
# PROCÈS-VERBAL DE L'ASSEMBLÉE GÉNÉRALE ORDINAIRE

Société {{RAISON_SOCIALE}} — {{FORME_JURIDIQUE}} au capital de {{CAPITAL}} dinars
Siège social : {{SIEGE_SOCIAL}}
Matricule fiscal : {{MATRICULE_FISCAL}} — Registre de commerce : {{RC}}

L'an {{ANNEE}}, le {{DATE_GENERATION}}, les associés de la société {{RAISON_SOCIALE}} se sont réunis en assemblée générale ordinaire au siège social.

Sont présents :
{{LISTE_ASSOCIES}}

# PREMIÈRE RÉSOLUTION — APPROBATION DES COMPTES

L'assemblée générale approuve les états financiers de l'exercice {{EXERCICE}} faisant apparaître une perte nette de {{RESULTAT}} dinars.

Cette résolution est adoptée à l'unanimité.

# DEUXIÈME RÉSOLUTION — AFFECTATION DU DÉFICIT

L'assemblée générale décide de reporter à nouveau le déficit de l'exercice {{EXERCICE}}, soit {{RESULTAT}} dinars.

Cette résolution est adoptée à l'unanimité.

De tout ce qui précède, il a été dressé le présent procès-verbal, signé par les associés.
",
};

const TEMPLATES: &[Template] = &[
    PV_AFFECTATION_BENEFICE,
    PV_DISTRIBUTION_DIVIDENDES,
    PV_AFFECTATION_DEFICIT,
];

pub fn all() -> &'static [Template] {
    TEMPLATES
}

pub fn find(key: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|template| template.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_resolves() {
        for template in all() {
            assert!(find(template.key).is_some());
        }
        assert!(find("pv-inconnu").is_none());
    }

    #[test]
    fn dividend_template_carries_the_breakdown_list() {
        let template = find("pv-distribution-dividendes").unwrap();
        assert!(template.body.contains("{{LIGNES_REPARTITION}}"));
    }
}

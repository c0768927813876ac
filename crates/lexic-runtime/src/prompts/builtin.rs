//! Built-in prompt templates.

use super::{OutputFormat, PromptCategory, PromptTemplate};

type Field = (&'static str, &'static str);

struct Spec {
    category: PromptCategory,
    name: &'static str,
    description: &'static str,
    inputs: &'static [Field],
    outputs: &'static [Field],
    format: OutputFormat,
}

const CLIENT_REQUEST: Field = (
    "client_request",
    "Demande initiale du client, telle qu'il l'a écrite, reflétant son style, son état émotionnel et son niveau de détail",
);
const QUALIFICATION: Field = (
    "qualification",
    "Rapport de qualification: résumé, objectifs, contraintes, questions juridiques",
);
const INITIAL_ANALYSIS: Field = (
    "initial_analysis",
    "Analyse juridique initiale avec les besoins d'investigation",
);
const INVESTIGATION_ORDER: Field = (
    "investigation_order",
    "Ordre d'investigation: objectif, questions au client, documents demandés",
);
const INVESTIGATION_REPORT: Field = (
    "investigation_report",
    "Rapport d'investigation avec les faits complémentaires (vide si aucun)",
);
const INITIAL_FACTS: Field = ("initial_facts", "Faits initiaux connus du client lors de la prise en charge");
const FACTUAL_RECORD: Field = ("factual_record", "État de fait du cas");
const CLIENT_PERSONA: Field = ("client_persona", "Profil du client: identité, situation, personnalité, objectifs");
const CONSIDERATIONS: Field = ("considerations", "Considérations juridiques");
const JUDGMENT: Field = ("judgment", "Jugement prévisible ou rendu");
const CLIENT_OBJECTIVES: Field = ("client_objectives", "Objectifs du client tirés du rapport de qualification");
const DECISION_CONTEXT: Field = (
    "decision_context",
    "Extraits de la décision judiciaire: parties, chronologie des faits, dispositif",
);
const DECISION_FACTS: Field = ("decision_facts", "Chronologie des faits établie par la décision");
const PARTY_ROLE: Field = (
    "party_role",
    "Rôle procédural du client dans la décision (demandeur ou défendeur)",
);

const SPECS: &[Spec] = &[
    // Drafting agents
    Spec {
        category: PromptCategory::Agents,
        name: "qualification",
        description: "Analyser la demande du client pour produire un rapport de qualification.\n\n\
Le rapport capture:\n- le résumé de la situation juridique du client\n- les objectifs du client\n\
- les contraintes (délais, budget, tolérance au risque)\n- les questions juridiques à traiter",
        inputs: &[CLIENT_REQUEST],
        outputs: &[(
            "qualification",
            "Rapport structuré avec: résumé, objectifs (liste à puces), contraintes (liste à puces), questions juridiques (liste à puces)",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "initial_analysis",
        description: "Effectuer une analyse juridique initiale à partir du rapport de qualification.\n\n\
L'analyse identifie:\n- le domaine juridique\n- les bases légales potentielles à investiguer\n\
- une évaluation préliminaire\n- les besoins d'investigation\n- la complexité du cas",
        inputs: &[QUALIFICATION],
        outputs: &[(
            "initial_analysis",
            "Analyse structurée avec: domaine juridique, bases légales potentielles (liste à puces), évaluation préliminaire, besoins d'investigation (liste à puces), complexité",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "investigation_order",
        description: "Établir un ordre d'investigation à partir de l'analyse initiale.\n\n\
L'ordre précise le but de l'investigation, les questions à poser au client et les documents à obtenir.",
        inputs: &[INITIAL_ANALYSIS],
        outputs: &[(
            "investigation_order",
            "Ordre d'investigation avec: objectif, questions (liste à puces), documents demandés (liste à puces)",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "investigation_report",
        description: "Simuler l'entretien avec le client et rédiger le rapport d'investigation.\n\n\
Le client répond aux questions de l'ordre d'investigation en restant fidèle à son profil et \
aux faits qu'il connaît. Il ne sait rien de ce qu'il n'a pas vécu.",
        inputs: &[INVESTIGATION_ORDER, CLIENT_PERSONA, INITIAL_FACTS],
        outputs: &[(
            "investigation_report",
            "Rapport d'investigation: réponses du client à chaque question, documents fournis, faits nouveaux",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "factual_record",
        description: "Rédiger un état de fait structuré.\n\n\
L'état de fait comprend un résumé, les parties, une chronologie, les faits déterminants et les moyens de preuve.",
        inputs: &[INITIAL_FACTS, INVESTIGATION_REPORT],
        outputs: &[(
            "factual_record",
            "État de fait avec: résumé, parties (liste à puces), chronologie (liste à puces, ordre chronologique), faits déterminants (liste à puces), preuves (liste à puces)",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "legal_basis",
        description: "Identifier les bases légales applicables à partir de l'état de fait.\n\n\
Pour chaque base légale: article ou disposition, nom de la loi, contenu, pertinence pour le cas.",
        inputs: &[FACTUAL_RECORD],
        outputs: &[(
            "legal_basis",
            "Bases légales applicables, chacune avec: article, loi, contenu, pertinence",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "arguments",
        description: "Développer les arguments juridiques à partir de l'état de fait et des bases légales.\n\n\
Pour chaque argument: thèse, bases légales, appui factuel, raisonnement reliant les faits à la conclusion.",
        inputs: &[FACTUAL_RECORD, ("legal_basis", "Bases légales applicables")],
        outputs: &[(
            "arguments",
            "Arguments juridiques, chacun avec: thèse, bases légales, appui factuel, raisonnement",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "considerations",
        description: "Analyser les considérations juridiques à partir des arguments et de l'état de fait.\n\n\
Pour chaque considération: question examinée, analyse, conclusion, niveau de confiance.",
        inputs: &[("arguments", "Arguments juridiques"), FACTUAL_RECORD],
        outputs: &[(
            "considerations",
            "Considérations juridiques, chacune avec: question, analyse, conclusion, niveau de confiance",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "judgment",
        description: "Prédire le jugement probable si le litige est porté devant le tribunal.\n\n\
Le dispositif indique l'issue pour chaque conclusion, les frais et les dépens, avec une brève motivation.",
        inputs: &[CONSIDERATIONS, FACTUAL_RECORD],
        outputs: &[(
            "judgment",
            "Jugement prévisible: dispositif, issue de chaque conclusion, frais et dépens, motivation résumée",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Agents,
        name: "recommendations",
        description: "Formuler des recommandations au client.\n\n\
Pour chaque recommandation: action, justification, risques, alternatives, prochaines étapes.",
        inputs: &[CONSIDERATIONS, JUDGMENT, CLIENT_OBJECTIVES],
        outputs: &[(
            "recommendations",
            "Recommandations, chacune avec: action, justification, risques (liste à puces), alternatives (liste à puces), prochaines étapes (liste à puces)",
        )],
        format: OutputFormat::Markdown,
    },
    // Backwards generation of synthetic cases
    Spec {
        category: PromptCategory::Generation,
        name: "client_persona",
        description: "Créer le profil réaliste du client qui a consulté un avocat avant le litige décrit \
par la décision. Le client occupe le rôle procédural indiqué. Il ne connaît pas l'issue du procès.",
        inputs: &[DECISION_CONTEXT, PARTY_ROLE],
        outputs: &[(
            "client_persona",
            "Profil du client: identité, situation personnelle ou professionnelle, personnalité, style de communication, objectifs",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "client_request",
        description: "Rédiger le premier message que le client adresse à son avocat, avec ses mots, \
ses émotions et ses imprécisions. Le message ne mentionne que ce que le client sait au moment de consulter.",
        inputs: &[CLIENT_PERSONA, DECISION_CONTEXT, PARTY_ROLE],
        outputs: &[("client_request", "Message initial du client à son avocat")],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "initial_facts",
        description: "Établir les faits tels que le client les connaît lors de la première consultation. \
Certains faits établis plus tard par l'instruction peuvent manquer ou être incomplets.",
        inputs: &[DECISION_CONTEXT, CLIENT_PERSONA, PARTY_ROLE],
        outputs: &[("initial_facts", "Faits initiaux connus du client (liste à puces)")],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "qualification",
        description: "Rédiger le rapport de qualification de référence qu'un avocat expérimenté \
établirait après la première consultation.",
        inputs: &[CLIENT_PERSONA, INITIAL_FACTS, DECISION_CONTEXT],
        outputs: &[(
            "qualification",
            "Rapport avec: résumé, objectifs (liste à puces), contraintes (liste à puces), questions juridiques (liste à puces)",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "initial_analysis",
        description: "Rédiger l'analyse juridique initiale de référence. Les bases légales retenues par \
la décision guident l'analyse sans être présentées comme certaines.",
        inputs: &[QUALIFICATION, ("decision_legal_bases", "Bases légales retenues par la décision")],
        outputs: &[(
            "initial_analysis",
            "Analyse avec: domaine juridique, bases légales potentielles, évaluation préliminaire, besoins d'investigation, complexité",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "investigation_order",
        description: "Rédiger l'ordre d'investigation de référence. Les questions doivent permettre \
d'établir les faits retenus par la décision.",
        inputs: &[INITIAL_ANALYSIS, DECISION_FACTS],
        outputs: &[(
            "investigation_order",
            "Ordre d'investigation avec: objectif, questions (liste à puces), documents demandés (liste à puces)",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "investigation_report",
        description: "Rédiger le rapport d'investigation de référence: les réponses du client aux \
questions de l'ordre, cohérentes avec les faits retenus par la décision.",
        inputs: &[INVESTIGATION_ORDER, DECISION_FACTS],
        outputs: &[("investigation_report", "Rapport d'investigation: réponses, documents fournis, faits nouveaux")],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "factual_record",
        description: "Rédiger l'état de fait de référence à partir des faits initiaux et, s'il existe, \
du rapport d'investigation. Ne retenir que ce qui est connu à ce stade.",
        inputs: &[INITIAL_FACTS, INVESTIGATION_REPORT, DECISION_FACTS],
        outputs: &[(
            "factual_record",
            "État de fait avec: résumé, parties, chronologie, faits déterminants, preuves",
        )],
        format: OutputFormat::Markdown,
    },
    Spec {
        category: PromptCategory::Generation,
        name: "recommendations",
        description: "Rédiger les recommandations de référence qu'un avocat aurait données à son client \
en connaissant les considérations et le jugement.",
        inputs: &[JUDGMENT, CONSIDERATIONS, CLIENT_OBJECTIVES],
        outputs: &[(
            "recommendations",
            "Recommandations avec: action, justification, risques, alternatives, prochaines étapes",
        )],
        format: OutputFormat::Markdown,
    },
    // Decision extraction
    Spec {
        category: PromptCategory::Extraction,
        name: "extract_all",
        description: "Extraire les éléments structurés d'une décision judiciaire. Reprendre le texte \
de la décision sans rien inventer; conserver les désignations anonymisées des parties.",
        inputs: &[("full_text", "Texte intégral de la décision")],
        outputs: &[
            ("parties", "Parties et leur rôle, une par ligne"),
            ("facts_timeline", "Chronologie des faits, un événement daté par ligne"),
            ("evidence", "Moyens de preuve mentionnés"),
            ("legal_bases", "Dispositions légales appliquées"),
            ("arguments", "Arguments des parties"),
            ("considerations", "Considérants du tribunal"),
            ("judgment", "Dispositif du jugement"),
        ],
        format: OutputFormat::Json,
    },
    Spec {
        category: PromptCategory::Extraction,
        name: "name_mapping",
        description: "Attribuer un nom fictif réaliste à chaque partie anonymisée (par exemple A., B. SA). \
Respecter le genre des personnes physiques et la forme juridique des sociétés.",
        inputs: &[
            ("parties", "Parties anonymisées"),
            ("context", "Extraits des faits et du jugement"),
        ],
        outputs: &[(
            "name_mapping",
            "Une ligne par partie au format `ANONYME: Nom fictif`",
        )],
        format: OutputFormat::Markdown,
    },
    // Judge
    Spec {
        category: PromptCategory::Judge,
        name: "evaluate_dimension",
        description: "Évaluer une prédiction par rapport à la référence sur une seule dimension de la grille. \
Appliquer strictement les critères de notation.",
        inputs: &[
            ("dimension_name", "Nom de la dimension"),
            ("dimension_description", "Ce que la dimension mesure"),
            ("scoring_criteria", "Critères pour chaque note de 1 à 5"),
            ("prediction", "Document produit par l'agent"),
            ("ground_truth", "Document de référence"),
        ],
        outputs: &[
            ("score", "Note entière de 1 à 5"),
            ("explanation", "Justification de la note"),
        ],
        format: OutputFormat::Json,
    },
    Spec {
        category: PromptCategory::Judge,
        name: "identify_critical_errors",
        description: "Identifier les erreurs critiques de la prédiction par rapport à la référence: \
erreurs de droit, faits inventés ou contredits, omissions qui changeraient l'issue.",
        inputs: &[
            ("prediction", "Document produit par l'agent"),
            ("ground_truth", "Document de référence"),
            ("rubric", "Grille d'évaluation de l'étape"),
        ],
        outputs: &[(
            "critical_errors",
            "Liste de chaînes, une par erreur critique; liste vide si aucune",
        )],
        format: OutputFormat::Json,
    },
];

fn to_owned(fields: &[Field]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(name, desc)| (name.to_string(), desc.to_string()))
        .collect()
}

pub(super) fn templates() -> impl Iterator<Item = PromptTemplate> {
    SPECS.iter().map(|spec| PromptTemplate {
        name: spec.name.to_string(),
        category: spec.category,
        description: spec.description.to_string(),
        inputs: to_owned(spec.inputs),
        outputs: to_owned(spec.outputs),
        format: spec.format,
    })
}
